//! blkstat — disk and CPU counter sampling.
//!
//! Reads kernel-exposed block-device and processor counters at fixed
//! intervals and derives per-second throughput, latency and
//! utilization metrics for display.
//!
//! Provides:
//! - `collector` — counter sources, pure parsers, the filesystem seam
//! - `store` — fixed-capacity device table and generation buffers
//! - `session` — owned per-run state, the upsert and group paths
//! - `rates` — rate and extended-statistics math
//! - `report` — reporters
//! - `sampler` — the tick loop
//! - `config` — run policy

pub mod collector;
pub mod config;
pub mod rates;
pub mod report;
pub mod sampler;
pub mod session;
pub mod store;
