//! Counter collection from the kernel's block-device stat sources.
//!
//! Two interchangeable sources exist: a single stats table with one
//! line per device, and a directory tree with one small stat file per
//! device. `probe_source` picks one at startup; afterwards every tick
//! flows through the same path:
//!
//! ```text
//!   CounterSource::collect_into
//!        │  parse (parser)            one tagged StatLine per row
//!        │  resolve (names)           canonical / devmapper lookups
//!        ▼
//!   Session::save_stats               the single upsert write path
//! ```
//!
//! All filesystem access goes through the `FileSystem` trait so the
//! collectors run against `RealFs` in production and `MockFs` in
//! tests.

pub mod diskstats;
pub mod mock;
pub mod names;
pub mod parser;
pub mod sysfs;
pub mod traits;

use std::fmt;
use std::path::Path;

pub use diskstats::TableSource;
pub use mock::MockFs;
pub use names::{NameResolver, NoResolver, StaticNames};
pub use parser::ParseError;
pub use sysfs::PerDeviceSource;
pub use traits::{FileSystem, RealFs};

use crate::config::Config;
use crate::session::Session;

/// Error type for collection failures.
#[derive(Debug)]
pub enum CollectError {
    /// I/O error reading a counter source.
    Io(std::io::Error),
    /// Parse error in a counter source.
    Parse(String),
}

impl fmt::Display for CollectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectError::Io(e) => write!(f, "I/O error: {}", e),
            CollectError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for CollectError {}

impl From<std::io::Error> for CollectError {
    fn from(e: std::io::Error) -> Self {
        CollectError::Io(e)
    }
}

impl From<ParseError> for CollectError {
    fn from(e: ParseError) -> Self {
        CollectError::Parse(e.message)
    }
}

/// Neither counter source exists on this system. Fatal at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceUnavailable;

impl fmt::Display for SourceUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot find disk data: no counter source available")
    }
}

impl std::error::Error for SourceUnavailable {}

/// One strategy for reading a full tick of device counters.
///
/// Chosen once at startup; every tick then drives the same upsert
/// path. A vanished source mid-run is a quiet no-op tick, not an
/// error.
pub trait CounterSource {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Devices a discovery pass can see right now; sizes the registry.
    fn device_count(&self) -> Result<usize, CollectError>;

    /// Reads every row of the current tick into the session.
    fn collect_into(&self, session: &mut Session) -> Result<(), CollectError>;
}

/// Extra registry slots kept free for devices appearing mid-run.
pub const SLOT_SLACK: usize = 4;

/// Picks the counter source available on this system.
///
/// The table source wins when its pseudo-file exists, unless stats for
/// a specific device's partitions were requested; only the per-device
/// tree resolves those.
pub fn probe_source<F, R>(
    fs: F,
    proc_path: &str,
    sysfs_path: &str,
    config: &Config,
    resolver: R,
) -> Result<Box<dyn CounterSource>, SourceUnavailable>
where
    F: FileSystem + Clone + 'static,
    R: NameResolver + 'static,
{
    let has_table = fs.exists(&Path::new(proc_path).join("diskstats"));
    let prefer_per_device = config.listed_partitions() && !config.all_partitions;

    if has_table && !prefer_per_device {
        return Ok(Box::new(TableSource::new(
            fs, proc_path, sysfs_path, resolver, config,
        )));
    }
    if fs.exists(&Path::new(sysfs_path).join("block")) {
        return Ok(Box::new(PerDeviceSource::new(fs, sysfs_path, config)));
    }
    Err(SourceUnavailable)
}

/// Reads one tick's CPU rows and uptime into the session.
///
/// The stat pseudo-file must exist; the uptime file is optional, with
/// the first processor's jiffy sum standing in for it.
pub fn collect_cpu<F: FileSystem>(
    fs: &F,
    proc_path: &str,
    session: &mut Session,
) -> Result<(), CollectError> {
    let ticks_per_sec = session.config().ticks_per_sec;

    let stat_content = fs.read_to_string(&Path::new(proc_path).join("stat"))?;
    let cpu = parser::parse_cpu_stat(&stat_content)?;

    let uptime = fs
        .read_to_string(&Path::new(proc_path).join("uptime"))
        .ok()
        .and_then(|content| parser::parse_uptime(&content, ticks_per_sec).ok());

    session.record_cpu(cpu.all, cpu.cpu0, uptime);
    Ok(())
}

/// Number of processors, counted from the stat pseudo-file's per-CPU
/// rows. At least 1.
pub fn count_cpus<F: FileSystem>(fs: &F, proc_path: &str) -> Result<usize, CollectError> {
    let content = fs.read_to_string(&Path::new(proc_path).join("stat"))?;
    let count = content
        .lines()
        .filter(|line| {
            line.strip_prefix("cpu")
                .and_then(|rest| rest.chars().next())
                .is_some_and(|c| c.is_ascii_digit())
        })
        .count();
    Ok(count.max(1))
}
