//! blkstat - disk and CPU statistics sampler.
//!
//! Samples the kernel's block-device and processor counters at a fixed
//! interval and prints per-second throughput, latency and utilization
//! metrics.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use blkstat::collector::{self, NoResolver, RealFs};
use blkstat::config::{Config, DeviceSpec, ReportMode, Unit};
use blkstat::rates::CpuUtil;
use blkstat::report::TextReporter;
use blkstat::sampler::Sampler;
use blkstat::session::Session;

/// Disk and CPU statistics sampler.
#[derive(Parser)]
#[command(name = "blkstat", about = "Disk and CPU statistics sampler", version)]
struct Args {
    /// Devices to sample; every discovered device when empty.
    devices: Vec<String>,

    /// Sampling interval in seconds. 0 prints one since-boot report.
    #[arg(short, long, default_value = "0")]
    interval: u64,

    /// Number of reports to print; 0 keeps sampling until interrupted.
    #[arg(short, long)]
    count: Option<u64>,

    /// Aggregate the sampled devices into a named group pseudo-device.
    #[arg(short, long)]
    group: Option<String>,

    /// Extended statistics: queue depth, waits, service time, utilization.
    #[arg(short = 'x', long)]
    extended: bool,

    /// Report throughput in kilobytes per second.
    #[arg(short = 'k', long, conflicts_with = "megabytes")]
    kilobytes: bool,

    /// Report throughput in megabytes per second.
    #[arg(short = 'm', long)]
    megabytes: bool,

    /// Skip the first report, whose statistics cover the time since boot.
    #[arg(short = 'y', long)]
    omit_since_boot: bool,

    /// Omit devices with no activity during the interval.
    #[arg(short = 'z', long)]
    zero_omit: bool,

    /// Keep devices that have never completed an I/O.
    #[arg(long)]
    include_idle: bool,

    /// Print only group totals.
    #[arg(long, requires = "group")]
    group_total_only: bool,

    /// Also sample partitions of DEV; "ALL" covers every device.
    #[arg(short = 'p', long = "partitions", value_name = "DEV")]
    partitions: Vec<String>,

    /// Prefix each report with a timestamp.
    #[arg(short = 't', long)]
    timestamp: bool,

    /// Use ISO 8601 timestamps.
    #[arg(long, requires = "timestamp")]
    iso: bool,

    /// Write the last CPU utilization block as JSON on exit.
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,

    /// Path to the proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Path to the sysfs root (for testing/mocking).
    #[arg(long, default_value = "/sys")]
    sysfs_path: String,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber. Default level is WARN so the
/// report itself stays clean; -v raises it.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::WARN,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("blkstat={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn build_config(args: &Args) -> Config {
    let mut config = Config {
        mode: if args.extended {
            ReportMode::Extended
        } else {
            ReportMode::Basic
        },
        unit: if args.kilobytes {
            Unit::Kilobytes
        } else if args.megabytes {
            Unit::Megabytes
        } else {
            Config::unit_from_env()
        },
        omit_since_boot: args.omit_since_boot,
        include_idle: args.include_idle,
        zero_omit: args.zero_omit,
        group_total_only: args.group_total_only,
        show_timestamp: args.timestamp,
        iso_timestamp: args.iso,
        group: args.group.clone(),
        ..Config::default()
    };

    for name in &args.devices {
        config.add_device(DeviceSpec::new(name));
    }
    for dev in &args.partitions {
        if dev == "ALL" {
            config.all_partitions = true;
        } else {
            config.add_device(DeviceSpec::with_partitions(dev));
        }
    }

    config
}

fn export_cpu_log(path: &Path, cpu: Option<CpuUtil>) {
    let Some(cpu) = cpu else {
        debug!("no report produced, skipping CPU stats export");
        return;
    };
    match serde_json::to_string_pretty(&cpu) {
        Ok(json) => match std::fs::write(path, json + "\n") {
            Ok(()) => info!("CPU stats written to {}", path.display()),
            Err(e) => error!("cannot write {}: {}", path.display(), e),
        },
        Err(e) => error!("cannot serialize CPU stats: {}", e),
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let mut config = build_config(&args);
    let mut count = args.count.unwrap_or(0);
    if args.interval == 0 {
        count = 1;
        if config.omit_since_boot {
            warn!("--omit-since-boot needs an interval; showing the since-boot report");
            config.omit_since_boot = false;
        }
    }

    info!("blkstat {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: interval={}s, count={}, proc={}, sysfs={}",
        args.interval, count, args.proc_path, args.sysfs_path
    );

    let fs = RealFs::new();
    let source = match collector::probe_source(
        fs,
        &args.proc_path,
        &args.sysfs_path,
        &config,
        NoResolver,
    ) {
        Ok(source) => source,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };
    info!("Counter source: {}", source.name());

    let discovered = match source.device_count() {
        Ok(n) => n,
        Err(e) => {
            error!("device discovery failed: {}", e);
            std::process::exit(2);
        }
    };
    let cpu_count = match collector::count_cpus(&fs, &args.proc_path) {
        Ok(n) => n,
        Err(e) => {
            error!("cannot read processor counters: {}", e);
            std::process::exit(2);
        }
    };
    let capacity = discovered + collector::SLOT_SLACK + config.group_count();
    debug!(
        "{} devices discovered, {} slots allocated, {} processors",
        discovered, capacity, cpu_count
    );

    let mut session = Session::new(config, capacity, cpu_count);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let mut reporter = TextReporter::new(io::stdout());
    let sampler = Sampler::new(
        fs,
        args.proc_path.as_str(),
        Duration::from_secs(args.interval),
        count,
    )
    .with_shutdown_flag(running);

    if let Err(e) = sampler.run(&mut session, source.as_ref(), &mut reporter) {
        error!("sampling failed: {}", e);
        std::process::exit(1);
    }

    if let Some(path) = &args.log {
        export_cpu_log(path, reporter.last_cpu());
    }
}
