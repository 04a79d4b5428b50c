//! Pre-built mock filesystem scenarios for collector tests.

use super::filesystem::MockFs;

impl MockFs {
    /// A four-CPU machine exposing the table source: three whole disks
    /// plus one legacy partition line.
    pub fn two_disk_system() -> Self {
        let mut fs = Self::new();

        fs.add_file("/proc/uptime", "12345.67 48000.00\n");
        fs.add_file(
            "/proc/stat",
            "\
cpu  10000 500 3000 80000 1000 200 100 0 0 0
cpu0 2500 125 750 20000 250 50 25 0 0 0
cpu1 2500 125 750 20000 250 50 25 0 0 0
cpu2 2500 125 750 20000 250 50 25 0 0 0
cpu3 2500 125 750 20000 250 50 25 0 0 0
ctxt 500000
btime 1700000000
processes 10000
",
        );
        fs.add_file(
            "/proc/diskstats",
            "\
   8       0 sda 12345 100 987654 5000 6789 50 456789 3000 0 4000 8000
   8       1 sda1 10000 800000 5000 400000
   8      16 sdb 2200 10 40960 300 1100 5 20480 150 0 500 700
 259       0 nvme0n1 50000 200 2000000 10000 30000 150 1500000 8000 5 15000 18000
",
        );

        // Whole devices appear in the sysfs block directory; the
        // partition does not.
        fs.add_dir("/sys/block/sda");
        fs.add_dir("/sys/block/sdb");
        fs.add_dir("/sys/block/nvme0n1");

        fs
    }

    /// A machine without the table source: stats only exist as
    /// per-device files, with one partitioned disk.
    pub fn sysfs_only_system() -> Self {
        let mut fs = Self::new();

        fs.add_file("/proc/uptime", "500.00 1900.00\n");
        fs.add_file(
            "/proc/stat",
            "\
cpu  4000 100 1000 44000 500 200 200 0 0 0
cpu0 2000 50 500 22000 250 100 100 0 0 0
cpu1 2000 50 500 22000 250 100 100 0 0 0
ctxt 100000
btime 1700000000
",
        );

        fs.add_block_device(
            "sda",
            "12345 100 987654 5000 6789 50 456789 3000 0 4000 8000",
            &[
                ("sda1", "10000 800000 5000 400000"),
                ("sda2", "2000 160000 1000 80000"),
            ],
        );
        fs.add_block_device("sdb", "2200 10 40960 300 1100 5 20480 150 0 500 700", &[]);

        fs
    }
}
