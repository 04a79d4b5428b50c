//! Report rendering.
//!
//! The sampler hands each displayed tick to a `Reporter`. The text
//! reporter prints the classic two-part report: a CPU utilization
//! line followed by the per-device table, walked in slot order.

use std::fmt::Write as _;
use std::io::Write;

use chrono::Local;

use crate::config::{Config, ReportMode, Unit};
use crate::rates::{self, CpuUtil};
use crate::session::Session;
use crate::store::registry::DeviceStatus;

/// Sink for one tick's derived metrics.
pub trait Reporter {
    fn report(&mut self, session: &Session);
}

/// Plain-text reporter writing to any output stream.
pub struct TextReporter<W> {
    out: W,
    last_cpu: Option<CpuUtil>,
}

impl<W: Write> TextReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_cpu: None,
        }
    }

    /// The most recently reported CPU block, for the exit-time export.
    pub fn last_cpu(&self) -> Option<CpuUtil> {
        self.last_cpu
    }

    fn unit_labels(unit: Unit) -> (&'static str, &'static str, &'static str, &'static str) {
        match unit {
            Unit::Sectors => ("Blk_read/s", "Blk_wrtn/s", "Blk_read", "Blk_wrtn"),
            Unit::Kilobytes => ("kB_read/s", "kB_wrtn/s", "kB_read", "kB_wrtn"),
            Unit::Megabytes => ("MB_read/s", "MB_wrtn/s", "MB_read", "MB_wrtn"),
        }
    }

    fn render(&mut self, session: &Session) -> String {
        let config = session.config();
        let mut buf = String::new();

        if config.show_timestamp {
            let now = Local::now();
            let stamp = if config.iso_timestamp {
                now.format("%Y-%m-%dT%H:%M:%S%z").to_string()
            } else {
                now.format("%m/%d/%Y %H:%M:%S").to_string()
            };
            let _ = writeln!(buf, "{}", stamp);
        }

        let itv = session.interval();
        let cpu = rates::cpu_util(session.cpu().previous(), session.cpu().current(), itv);
        self.last_cpu = Some(cpu);
        let _ = writeln!(
            buf,
            "avg-cpu:  %user   %nice %system %iowait  %steal   %idle"
        );
        let _ = writeln!(
            buf,
            "       {:7.2} {:7.2} {:7.2} {:7.2} {:7.2} {:7.2}",
            cpu.user, cpu.nice, cpu.system, cpu.iowait, cpu.steal, cpu.idle
        );
        let _ = writeln!(buf);

        let itv = session.disk_interval();
        let divisor = config.unit.sector_divisor();
        self.render_device_header(&mut buf, config);

        for (_, slot) in session.devices().iter() {
            let header = &slot.header;
            if !header.used {
                continue;
            }
            let curr = slot.counters.current();
            let prev = slot.counters.previous();

            if !config.include_idle && curr.is_idle() {
                continue;
            }
            if config.zero_omit && curr.rd_ios == prev.rd_ios && curr.wr_ios == prev.wr_ios {
                continue;
            }
            if config.group_total_only && header.status != DeviceStatus::Group {
                continue;
            }

            match config.mode {
                ReportMode::Extended => {
                    let stats = rates::extended_stats(
                        prev,
                        curr,
                        itv,
                        config.ticks_per_sec,
                        header.members,
                    );
                    let _ = writeln!(
                        buf,
                        "{:<13} {:8.2} {:8.2} {:7.2} {:7.2} {:8.2} {:8.2} {:8.2} {:8.2} {:7.2} {:7.2} {:7.2} {:6.2} {:6.2}",
                        header.name,
                        stats.rd_merges_s,
                        stats.wr_merges_s,
                        stats.rd_ios_s,
                        stats.wr_ios_s,
                        stats.rd_sectors_s / divisor,
                        stats.wr_sectors_s / divisor,
                        stats.avg_request_size,
                        stats.avg_queue_len,
                        stats.await_ms,
                        stats.rd_await_ms,
                        stats.wr_await_ms,
                        stats.svctm_ms,
                        stats.util_pct,
                    );
                }
                ReportMode::Basic => {
                    let stats = rates::basic_stats(prev, curr, itv, config.ticks_per_sec);
                    let _ = writeln!(
                        buf,
                        "{:<13} {:10.2} {:12.2} {:12.2} {:10} {:10}",
                        header.name,
                        stats.tps,
                        stats.rd_sectors_s / divisor,
                        stats.wr_sectors_s / divisor,
                        (stats.rd_sectors as f64 / divisor) as u64,
                        (stats.wr_sectors as f64 / divisor) as u64,
                    );
                }
            }
        }
        let _ = writeln!(buf);

        buf
    }

    fn render_device_header(&self, buf: &mut String, config: &Config) {
        match config.mode {
            ReportMode::Extended => {
                let rate = match config.unit {
                    Unit::Sectors => ("  rsec/s", "  wsec/s"),
                    Unit::Kilobytes => ("   rkB/s", "   wkB/s"),
                    Unit::Megabytes => ("   rMB/s", "   wMB/s"),
                };
                let _ = writeln!(
                    buf,
                    "Device:         rrqm/s   wrqm/s     r/s     w/s {} {} avgrq-sz avgqu-sz   await r_await w_await  svctm  %util",
                    rate.0, rate.1
                );
            }
            ReportMode::Basic => {
                let (rd_rate, wr_rate, rd_total, wr_total) = Self::unit_labels(config.unit);
                let _ = writeln!(
                    buf,
                    "Device:              tps {:>12} {:>12} {:>10} {:>10}",
                    rd_rate, wr_rate, rd_total, wr_total
                );
            }
        }
    }
}

impl<W: Write> Reporter for TextReporter<W> {
    fn report(&mut self, session: &Session) {
        let rendered = self.render(session);
        let _ = self.out.write_all(rendered.as_bytes());
        let _ = self.out.flush();
    }
}
