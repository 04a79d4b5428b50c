//! Raw counter rows shared by both kernel sources.

use serde::{Deserialize, Serialize};

/// One device's monotonic I/O counters, as the kernel accumulates them
/// since boot. Sector counts are 512-byte sectors; tick fields are
/// milliseconds. Values may wrap at 32 bits regardless of how wide we
/// store them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoCounters {
    pub rd_ios: u64,
    pub rd_merges: u64,
    pub rd_sectors: u64,
    pub rd_ticks: u64,
    pub wr_ios: u64,
    pub wr_merges: u64,
    pub wr_sectors: u64,
    pub wr_ticks: u64,
    pub ios_in_progress: u64,
    pub tot_ticks: u64,
    pub rq_ticks: u64,
}

impl IoCounters {
    /// Field-wise accumulation, used when folding devices into a group
    /// pseudo-row.
    pub fn add(&mut self, other: &IoCounters) {
        self.rd_ios += other.rd_ios;
        self.rd_merges += other.rd_merges;
        self.rd_sectors += other.rd_sectors;
        self.rd_ticks += other.rd_ticks;
        self.wr_ios += other.wr_ios;
        self.wr_merges += other.wr_merges;
        self.wr_sectors += other.wr_sectors;
        self.wr_ticks += other.wr_ticks;
        self.ios_in_progress += other.ios_in_progress;
        self.tot_ticks += other.tot_ticks;
        self.rq_ticks += other.rq_ticks;
    }

    /// True when the device has never completed an I/O in either
    /// direction.
    pub fn is_idle(&self) -> bool {
        self.rd_ios == 0 && self.wr_ios == 0
    }
}

/// Aggregate CPU jiffy counters from the stat pseudo-file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuCounters {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
    pub guest: u64,
    pub guest_nice: u64,
}

impl CpuCounters {
    /// Jiffies spent in any state; the uptime base for interval math.
    /// Guest time is already accounted inside user/nice and is not
    /// added again.
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }
}
