//! Per-device-file collector: one small stat file per block device,
//! optionally one per partition.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::collector::parser;
use crate::collector::{CollectError, CounterSource, FileSystem};
use crate::config::{Config, DeviceSpec, ReportMode};
use crate::session::Session;

/// Reads counters from the block-device directory tree.
pub struct PerDeviceSource<F> {
    fs: F,
    block_dir: PathBuf,
    /// Explicit devices, names already rewritten for path use; empty
    /// means enumerate the whole tree.
    devices: Vec<DeviceSpec>,
    all_partitions: bool,
    extended: bool,
}

impl<F: FileSystem> PerDeviceSource<F> {
    pub fn new(fs: F, sysfs_path: &str, config: &Config) -> Self {
        let devices = config
            .devices
            .iter()
            .map(|spec| DeviceSpec {
                // Some device names carry a slash (cciss/c0d0); sysfs
                // spells those with a bang.
                name: spec.name.replace('/', "!"),
                with_partitions: spec.with_partitions,
            })
            .collect();
        Self {
            fs,
            block_dir: Path::new(sysfs_path).join("block"),
            devices,
            all_partitions: config.all_partitions,
            extended: config.mode == ReportMode::Extended,
        }
    }

    /// Reads one stat file and upserts it under `name`. Returns true
    /// when the file existed, whether or not its row was stored.
    fn read_stat(&self, session: &mut Session, path: &Path, name: &str) -> bool {
        let content = match self.fs.read_to_string(path) {
            Ok(content) => content,
            Err(_) => return false,
        };
        let stat = match parser::parse_stat_file(&content) {
            Ok(stat) => stat,
            Err(e) => {
                debug!(device = name, error = %e, "skipping malformed stat file");
                return true;
            }
        };
        // Legacy rows carry no extended counters; don't store them
        // when extended stats are wanted.
        if stat.is_partial() && self.extended {
            return true;
        }
        session.save_stats(name, stat.into_counters());
        true
    }

    fn read_device(&self, session: &mut Session, name: &str) -> bool {
        let path = self.block_dir.join(name).join("stat");
        self.read_stat(session, &path, name)
    }

    /// Reads stats for every partition of a device. Partition
    /// subdirectories are the entries that carry their own stat file.
    fn read_partitions(&self, session: &mut Session, device: &str) {
        let dev_dir = self.block_dir.join(device);
        let Ok(mut entries) = self.fs.read_dir(&dev_dir) else {
            return;
        };
        entries.sort();

        for entry in entries {
            let stat_path = entry.join("stat");
            if !self.fs.exists(&stat_path) {
                continue;
            }
            let Some(part) = entry.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            self.read_stat(session, &stat_path, part);
        }
    }

    fn partition_count(&self, dev_dir: &Path) -> usize {
        self.fs
            .read_dir(dev_dir)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| self.fs.exists(&entry.join("stat")))
                    .count()
            })
            .unwrap_or(0)
    }
}

impl<F: FileSystem> CounterSource for PerDeviceSource<F> {
    fn name(&self) -> &'static str {
        "per-device"
    }

    fn device_count(&self) -> Result<usize, CollectError> {
        if self.devices.is_empty() {
            let entries = self.fs.read_dir(&self.block_dir)?;
            let mut count = 0;
            for entry in &entries {
                if !self.fs.exists(&entry.join("stat")) {
                    continue;
                }
                count += 1;
                if self.all_partitions {
                    count += self.partition_count(entry);
                }
            }
            Ok(count)
        } else {
            let mut count = self.devices.len();
            for spec in &self.devices {
                if spec.with_partitions || self.all_partitions {
                    count += self.partition_count(&self.block_dir.join(&spec.name));
                }
            }
            Ok(count)
        }
    }

    fn collect_into(&self, session: &mut Session) -> Result<(), CollectError> {
        if self.devices.is_empty() {
            let mut entries = match self.fs.read_dir(&self.block_dir) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(error = %e, "block directory unreadable, skipping tick");
                    return Ok(());
                }
            };
            entries.sort();

            for entry in entries {
                let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if self.read_device(session, name) && self.all_partitions {
                    self.read_partitions(session, name);
                }
            }
        } else {
            for spec in &self.devices {
                let ok = self.read_device(session, &spec.name);
                if ok && (spec.with_partitions || self.all_partitions) {
                    self.read_partitions(session, &spec.name);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;
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
        let source = PerDeviceSource::new(fs, "/sys", &config);
        let mut session = Session::new(config, 16, 2);
        session.begin_collection();
        source.collect_into(&mut session).unwrap();
        session.end_collection();
        session
    }

    #[test]
    fn enumerates_all_devices() {
        let session = collect(Config::default(), MockFs::sysfs_only_system());
        assert_eq!(collected_names(&session), ["sda", "sdb"]);

        let id = session.devices().lookup("sda").unwrap();
        let row = session.devices().get(id).counters.current();
        assert_eq!(row.rd_ios, 12345);
        assert_eq!(row.tot_ticks, 4000);
    }

    #[test]
    fn all_partitions_policy_recurses() {
        let config = Config {
            all_partitions: true,
            ..Config::default()
        };
        let session = collect(config, MockFs::sysfs_only_system());
        assert_eq!(collected_names(&session), ["sda", "sda1", "sda2", "sdb"]);

        let id = session.devices().lookup("sda2").unwrap();
        assert_eq!(session.devices().get(id).counters.current().rd_ios, 2000);
    }

    #[test]
    fn listed_device_with_partitions() {
        let config = Config {
            devices: vec![DeviceSpec::with_partitions("sda")],
            ..Config::default()
        };
        let session = collect(config, MockFs::sysfs_only_system());
        // sdb was not asked for.
        assert_eq!(collected_names(&session), ["sda", "sda1", "sda2"]);
    }

    #[test]
    fn listed_device_without_partitions() {
        let config = Config {
            devices: vec![DeviceSpec::new("sdb")],
            ..Config::default()
        };
        let session = collect(config, MockFs::sysfs_only_system());
        assert_eq!(collected_names(&session), ["sdb"]);
    }

    #[test]
    fn slash_names_are_rewritten_for_paths() {
        let mut fs = MockFs::new();
        fs.add_block_device("cciss!c0d0", "1 0 8 1 1 0 8 1 0 1 1", &[]);

        let config = Config {
            devices: vec![DeviceSpec::new("cciss/c0d0")],
            ..Config::default()
        };
        let session = collect(config, fs);
        assert!(session.devices().lookup("cciss!c0d0").is_some());
    }

    #[test]
    fn extended_mode_skips_legacy_partition_files() {
        let config = Config {
            mode: ReportMode::Extended,
            all_partitions: true,
            ..Config::default()
        };
        let session = collect(config, MockFs::sysfs_only_system());
        // Partitions only expose the 4-field legacy form here.
        assert_eq!(collected_names(&session), ["sda", "sdb"]);
    }

    #[test]
    fn missing_listed_device_is_skipped() {
        let config = Config {
            devices: vec![DeviceSpec::new("sdq")],
            ..Config::default()
        };
        let session = collect(config, MockFs::sysfs_only_system());
        assert!(collected_names(&session).is_empty());
    }

    #[test]
    fn device_count_includes_partitions_when_asked() {
        let fs = MockFs::sysfs_only_system();
        let plain = PerDeviceSource::new(fs.clone(), "/sys", &Config::default());
        assert_eq!(plain.device_count().unwrap(), 2);

        let all = PerDeviceSource::new(
            fs.clone(),
            "/sys",
            &Config {
                all_partitions: true,
                ..Config::default()
            },
        );
        assert_eq!(all.device_count().unwrap(), 4);

        let listed = PerDeviceSource::new(
            fs,
            "/sys",
            &Config {
                devices: vec![DeviceSpec::with_partitions("sda")],
                ..Config::default()
            },
        );
        assert_eq!(listed.device_count().unwrap(), 3);
    }
}
