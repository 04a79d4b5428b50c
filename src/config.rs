//! Run configuration and display policy.

use std::env;

/// Kernel counters tick at USER_HZ, which is fixed ABI for the
/// pseudo-files both sources expose.
pub const USER_HZ: u64 = 100;

/// Disk throughput unit for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Sectors,
    Kilobytes,
    Megabytes,
}

impl Unit {
    /// Sectors-per-unit divisor applied to sector counts and rates.
    pub fn sector_divisor(self) -> f64 {
        match self {
            Unit::Sectors => 1.0,
            Unit::Kilobytes => 2.0,
            Unit::Megabytes => 2048.0,
        }
    }
}

/// Report layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportMode {
    #[default]
    Basic,
    Extended,
}

/// One explicitly requested device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSpec {
    pub name: String,
    /// Collect this device's partitions too.
    pub with_partitions: bool,
}

impl DeviceSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            with_partitions: false,
        }
    }

    pub fn with_partitions(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            with_partitions: true,
        }
    }
}

/// Everything one sampling run needs to know.
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: ReportMode,
    pub unit: Unit,
    /// Suppress the since-boot priming report.
    pub omit_since_boot: bool,
    /// Keep devices that have never completed an I/O in group sums and
    /// in the report.
    pub include_idle: bool,
    /// Hide rows with no activity during the interval.
    pub zero_omit: bool,
    /// Show only group pseudo-rows.
    pub group_total_only: bool,
    /// Collect partitions of every discovered device.
    pub all_partitions: bool,
    pub show_timestamp: bool,
    pub iso_timestamp: bool,
    pub ticks_per_sec: u64,
    /// Explicit devices; empty means collect everything discovered.
    pub devices: Vec<DeviceSpec>,
    /// Group pseudo-device name, when grouping is on.
    pub group: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: ReportMode::Basic,
            unit: Unit::Kilobytes,
            omit_since_boot: false,
            include_idle: false,
            zero_omit: false,
            group_total_only: false,
            all_partitions: false,
            show_timestamp: false,
            iso_timestamp: false,
            ticks_per_sec: USER_HZ,
            devices: Vec::new(),
            group: None,
        }
    }
}

impl Config {
    /// Default unit the way the environment dictates: kB/s unless
    /// POSIXLY_CORRECT asks for raw sector counts.
    pub fn unit_from_env() -> Unit {
        if env::var_os("POSIXLY_CORRECT").is_some() {
            Unit::Sectors
        } else {
            Unit::Kilobytes
        }
    }

    /// True when any partition collection was requested.
    pub fn partitions_requested(&self) -> bool {
        self.all_partitions || self.listed_partitions()
    }

    /// True when partitions of specific listed devices were requested.
    /// Only the per-device source can resolve those.
    pub fn listed_partitions(&self) -> bool {
        self.devices.iter().any(|d| d.with_partitions)
    }

    /// Registry slots reserved for group pseudo-devices.
    pub fn group_count(&self) -> usize {
        usize::from(self.group.is_some())
    }

    /// Adds a device to the explicit list, merging the partition flag
    /// into an existing entry for the same name.
    pub fn add_device(&mut self, spec: DeviceSpec) {
        if let Some(existing) = self.devices.iter_mut().find(|d| d.name == spec.name) {
            existing.with_partitions |= spec.with_partitions;
        } else {
            self.devices.push(spec);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_device_merges_partition_flag() {
        let mut config = Config::default();
        config.add_device(DeviceSpec::new("sda"));
        config.add_device(DeviceSpec::with_partitions("sda"));
        config.add_device(DeviceSpec::new("sdb"));

        assert_eq!(config.devices.len(), 2);
        assert!(config.devices[0].with_partitions);
        assert!(!config.devices[1].with_partitions);
    }

    #[test]
    fn partition_policies() {
        let mut config = Config::default();
        assert!(!config.partitions_requested());

        config.add_device(DeviceSpec::with_partitions("sda"));
        assert!(config.partitions_requested());
        assert!(config.listed_partitions());

        let all = Config {
            all_partitions: true,
            ..Config::default()
        };
        assert!(all.partitions_requested());
        assert!(!all.listed_partitions());
    }
}
