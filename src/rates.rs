//! Rate and extended-statistics computation.
//!
//! Pure functions from two counter generations plus an elapsed tick
//! interval to per-second metrics. Every division is zero-guarded: a
//! zero interval or a zero I/O delta yields a defined 0.0, never
//! NaN or infinity.

use serde::Serialize;

use crate::store::model::{CpuCounters, IoCounters};

/// Counters wrap at 32 bits regardless of storage width. A single
/// wrap per interval is assumed; the mask below recovers the delta
/// for exactly one rollover.
const WRAP_MASK: u64 = 0xffff_ffff;

/// Elapsed ticks between two uptime readings. A zero previous reading
/// means the first sample, where the interval spans the whole time
/// since boot.
pub fn interval_ticks(prev: u64, curr: u64) -> u64 {
    if prev == 0 {
        curr
    } else {
        curr.saturating_sub(prev)
    }
}

/// Counter delta with wraparound correction: an apparent decrease with
/// the previous value inside the fixed width is a rollover, not
/// negative throughput.
pub fn delta(prev: u64, curr: u64) -> u64 {
    let d = curr.wrapping_sub(prev);
    if curr < prev && prev <= WRAP_MASK {
        d & WRAP_MASK
    } else {
        d
    }
}

/// Per-second rate of a counter over `itv` ticks.
pub fn per_second(prev: u64, curr: u64, itv: u64, ticks_per_sec: u64) -> f64 {
    if itv == 0 {
        return 0.0;
    }
    delta(prev, curr) as f64 / itv as f64 * ticks_per_sec as f64
}

/// Share of the interval a tick counter was running, in percent.
pub fn percent(prev: u64, curr: u64, itv: u64) -> f64 {
    if itv == 0 {
        return 0.0;
    }
    delta(prev, curr) as f64 / itv as f64 * 100.0
}

/// Derived extended statistics for one device row. Recomputed every
/// tick, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExtendedStats {
    pub rd_merges_s: f64,
    pub wr_merges_s: f64,
    pub rd_ios_s: f64,
    pub wr_ios_s: f64,
    pub rd_sectors_s: f64,
    pub wr_sectors_s: f64,
    /// Average sectors per completed request.
    pub avg_request_size: f64,
    /// Average request-queue length.
    pub avg_queue_len: f64,
    /// Mean wait per completed I/O, queue and service combined, ms.
    pub await_ms: f64,
    pub rd_await_ms: f64,
    pub wr_await_ms: f64,
    /// Mean service time per I/O, ms.
    pub svctm_ms: f64,
    /// Device utilization percentage, averaged over the group member
    /// count for group rows.
    pub util_pct: f64,
}

/// Computes extended stats from two generations of one row.
///
/// `members` is the group averaging divisor; 0 or 1 for plain devices.
pub fn extended_stats(
    prev: &IoCounters,
    curr: &IoCounters,
    itv: u64,
    ticks_per_sec: u64,
    members: u32,
) -> ExtendedStats {
    let d_rd_ios = delta(prev.rd_ios, curr.rd_ios);
    let d_wr_ios = delta(prev.wr_ios, curr.wr_ios);
    let d_ios = d_rd_ios + d_wr_ios;

    // Busy milliseconds per second; /10 turns it into a percentage.
    let util = per_second(prev.tot_ticks, curr.tot_ticks, itv, ticks_per_sec);

    let await_ms = if d_ios != 0 {
        (delta(prev.rd_ticks, curr.rd_ticks) + delta(prev.wr_ticks, curr.wr_ticks)) as f64
            / d_ios as f64
    } else {
        0.0
    };
    let rd_await_ms = if d_rd_ios != 0 {
        delta(prev.rd_ticks, curr.rd_ticks) as f64 / d_rd_ios as f64
    } else {
        0.0
    };
    let wr_await_ms = if d_wr_ios != 0 {
        delta(prev.wr_ticks, curr.wr_ticks) as f64 / d_wr_ios as f64
    } else {
        0.0
    };
    let avg_request_size = if d_ios != 0 {
        (delta(prev.rd_sectors, curr.rd_sectors) + delta(prev.wr_sectors, curr.wr_sectors)) as f64
            / d_ios as f64
    } else {
        0.0
    };
    // Busy ms per completed I/O; the interval cancels out of
    // utilization over throughput.
    let svctm_ms = if d_ios != 0 {
        delta(prev.tot_ticks, curr.tot_ticks) as f64 / d_ios as f64
    } else {
        0.0
    };

    ExtendedStats {
        rd_merges_s: per_second(prev.rd_merges, curr.rd_merges, itv, ticks_per_sec),
        wr_merges_s: per_second(prev.wr_merges, curr.wr_merges, itv, ticks_per_sec),
        rd_ios_s: per_second(prev.rd_ios, curr.rd_ios, itv, ticks_per_sec),
        wr_ios_s: per_second(prev.wr_ios, curr.wr_ios, itv, ticks_per_sec),
        rd_sectors_s: per_second(prev.rd_sectors, curr.rd_sectors, itv, ticks_per_sec),
        wr_sectors_s: per_second(prev.wr_sectors, curr.wr_sectors, itv, ticks_per_sec),
        avg_request_size,
        avg_queue_len: per_second(prev.rq_ticks, curr.rq_ticks, itv, ticks_per_sec) / 1000.0,
        await_ms,
        rd_await_ms,
        wr_await_ms,
        svctm_ms,
        util_pct: util / 10.0 / f64::from(members.max(1)),
    }
}

/// Basic (non-extended) statistics for one device row.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BasicStats {
    /// Completed transfers per second, both directions.
    pub tps: f64,
    pub rd_sectors_s: f64,
    pub wr_sectors_s: f64,
    /// Interval totals, raw sectors.
    pub rd_sectors: u64,
    pub wr_sectors: u64,
}

pub fn basic_stats(prev: &IoCounters, curr: &IoCounters, itv: u64, ticks_per_sec: u64) -> BasicStats {
    BasicStats {
        tps: per_second(
            prev.rd_ios + prev.wr_ios,
            curr.rd_ios + curr.wr_ios,
            itv,
            ticks_per_sec,
        ),
        rd_sectors_s: per_second(prev.rd_sectors, curr.rd_sectors, itv, ticks_per_sec),
        wr_sectors_s: per_second(prev.wr_sectors, curr.wr_sectors, itv, ticks_per_sec),
        rd_sectors: delta(prev.rd_sectors, curr.rd_sectors),
        wr_sectors: delta(prev.wr_sectors, curr.wr_sectors),
    }
}

/// CPU utilization percentages over one all-CPU interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CpuUtil {
    pub user: f64,
    pub nice: f64,
    /// Kernel time, hard and soft interrupt time included.
    pub system: f64,
    pub iowait: f64,
    pub steal: f64,
    pub idle: f64,
}

/// Computes the CPU utilization block. The idle counter can step
/// backwards when a processor goes offline; that clamps to 0.
pub fn cpu_util(prev: &CpuCounters, curr: &CpuCounters, itv: u64) -> CpuUtil {
    CpuUtil {
        user: percent(prev.user, curr.user, itv),
        nice: percent(prev.nice, curr.nice, itv),
        system: percent(
            prev.system + prev.irq + prev.softirq,
            curr.system + curr.irq + curr.softirq,
            itv,
        ),
        iowait: percent(prev.iowait, curr.iowait, itv),
        steal: percent(prev.steal, curr.steal, itv),
        idle: if curr.idle < prev.idle {
            0.0
        } else {
            percent(prev.idle, curr.idle, itv)
        },
    }
}
