//! Table-source collector: one pseudo-file, one line per device or
//! partition.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::collector::names::{self, NameResolver};
use crate::collector::parser;
use crate::collector::{CollectError, CounterSource, FileSystem};
use crate::config::{Config, ReportMode};
use crate::session::Session;

/// Reads every device's counters from the single stats table.
pub struct TableSource<F, R> {
    fs: F,
    table_path: PathBuf,
    block_dir: PathBuf,
    resolver: R,
    extended: bool,
    /// Partition rows qualify for storage (explicit device list or an
    /// active partition policy).
    accept_partitions: bool,
    /// Only collect these names when non-empty.
    explicit: Vec<String>,
}

impl<F: FileSystem, R: NameResolver> TableSource<F, R> {
    pub fn new(fs: F, proc_path: &str, sysfs_path: &str, resolver: R, config: &Config) -> Self {
        Self {
            fs,
            table_path: Path::new(proc_path).join("diskstats"),
            block_dir: Path::new(sysfs_path).join("block"),
            resolver,
            extended: config.mode == ReportMode::Extended,
            accept_partitions: !config.devices.is_empty() || config.partitions_requested(),
            explicit: config.devices.iter().map(|d| d.name.clone()).collect(),
        }
    }

    /// Whole devices have an entry in the sysfs block directory;
    /// partitions do not.
    fn is_whole_device(&self, name: &str) -> bool {
        self.fs.exists(&self.block_dir.join(name))
    }
}

impl<F: FileSystem, R: NameResolver> CounterSource for TableSource<F, R> {
    fn name(&self) -> &'static str {
        "table"
    }

    fn device_count(&self) -> Result<usize, CollectError> {
        let content = self.fs.read_to_string(&self.table_path)?;
        Ok(content
            .lines()
            .filter(|line| parser::parse_table_line(line).is_ok())
            .count())
    }

    fn collect_into(&self, session: &mut Session) -> Result<(), CollectError> {
        let content = match self.fs.read_to_string(&self.table_path) {
            Ok(content) => content,
            Err(e) => {
                debug!(error = %e, "stats table unreadable, skipping tick");
                return Ok(());
            }
        };

        for line in content.lines() {
            let row = match parser::parse_table_line(line) {
                Ok(row) => row,
                Err(e) => {
                    debug!(error = %e, "skipping malformed line");
                    continue;
                }
            };

            if row.stat.is_partial() {
                // Legacy partition rows carry no extended counters and
                // only matter when partitions were asked for.
                if self.extended || !self.accept_partitions {
                    continue;
                }
            } else if !self.accept_partitions && !self.is_whole_device(&row.name) {
                continue;
            }

            let name = names::resolve_name(&self.resolver, row.major, row.minor, &row.name);
            if !self.explicit.is_empty() && !self.explicit.iter().any(|d| *d == name) {
                continue;
            }

            session.save_stats(&name, row.stat.into_counters());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;
    use crate::collector::names::{NoResolver, StaticNames};
    use crate::config::DeviceSpec;
    use crate::store::registry::DeviceStatus;

    fn collected_names(session: &Session) -> Vec<String> {
        session
            .devices()
            .iter()
            .filter(|(_, s)| s.header.used && s.header.status == DeviceStatus::Registered)
            .map(|(_, s)| s.header.name.clone())
            .collect()
    }

    fn collect(config: Config, fs: MockFs) -> Session {
        let source = TableSource::new(fs, "/proc", "/sys", NoResolver, &config);
        let mut session = Session::new(config, 16, 4);
        session.begin_collection();
        source.collect_into(&mut session).unwrap();
        session.end_collection();
        session
    }

    #[test]
    fn collects_whole_devices_by_default() {
        let session = collect(Config::default(), MockFs::two_disk_system());
        // The sda1 partition line is skipped without a partition policy.
        assert_eq!(collected_names(&session), ["sda", "sdb", "nvme0n1"]);

        let id = session.devices().lookup("sda").unwrap();
        let row = session.devices().get(id).counters.current();
        assert_eq!(row.rd_ios, 12345);
        assert_eq!(row.rq_ticks, 8000);
    }

    #[test]
    fn partition_policy_admits_legacy_rows() {
        let config = Config {
            all_partitions: true,
            ..Config::default()
        };
        let session = collect(config, MockFs::two_disk_system());
        assert!(collected_names(&session).contains(&"sda1".to_string()));

        let id = session.devices().lookup("sda1").unwrap();
        let row = session.devices().get(id).counters.current();
        assert_eq!(row.rd_ios, 10000);
        assert_eq!(row.rd_sectors, 800000);
        // Legacy rows have no extended counters.
        assert_eq!(row.tot_ticks, 0);
    }

    #[test]
    fn extended_mode_drops_legacy_rows() {
        let config = Config {
            mode: ReportMode::Extended,
            all_partitions: true,
            ..Config::default()
        };
        let session = collect(config, MockFs::two_disk_system());
        assert!(session.devices().lookup("sda1").is_none());
        assert!(session.devices().lookup("sda").is_some());
    }

    #[test]
    fn explicit_list_restricts_collection() {
        let config = Config {
            devices: vec![DeviceSpec::new("sdb")],
            ..Config::default()
        };
        let session = collect(config, MockFs::two_disk_system());
        assert!(session.devices().lookup("sda").is_none());
        assert!(session.devices().lookup("nvme0n1").is_none());

        let id = session.devices().lookup("sdb").unwrap();
        assert_eq!(session.devices().get(id).counters.current().rd_ios, 2200);
    }

    #[test]
    fn malformed_lines_do_not_abort_the_pass() {
        let mut fs = MockFs::two_disk_system();
        fs.add_file(
            "/proc/diskstats",
            "\
   8       0 sda 12345 100 987654 5000 6789 50 456789 3000 0 4000 8000
garbage line that parses as nothing
   8      16 sdb 2200 10 40960 300 1100 5 20480 150 0 500 700
",
        );
        let session = collect(Config::default(), fs);
        assert_eq!(collected_names(&session), ["sda", "sdb"]);
    }

    #[test]
    fn name_substitution_applies_before_upsert() {
        let mut resolver = StaticNames::new();
        resolver.add_canonical(8, 0, "emcpowera");
        resolver.add_devmap(259, 0, "vg0-data");

        let config = Config::default();
        let source = TableSource::new(MockFs::two_disk_system(), "/proc", "/sys", resolver, &config);
        let mut session = Session::new(config, 16, 4);
        source.collect_into(&mut session).unwrap();

        assert!(session.devices().lookup("emcpowera").is_some());
        assert!(session.devices().lookup("sda").is_none());
        assert!(session.devices().lookup("vg0-data").is_some());
    }

    #[test]
    fn missing_table_is_a_quiet_no_op() {
        let source = TableSource::new(MockFs::new(), "/proc", "/sys", NoResolver, &Config::default());
        let mut session = Session::new(Config::default(), 4, 1);
        assert!(source.collect_into(&mut session).is_ok());
        assert!(session.devices().iter().all(|(_, s)| !s.header.used));
    }

    #[test]
    fn device_count_counts_parseable_lines() {
        let config = Config::default();
        let source = TableSource::new(
            MockFs::two_disk_system(),
            "/proc",
            "/sys",
            NoResolver,
            &config,
        );
        assert_eq!(source.device_count().unwrap(), 4);
    }
}
