//! The per-tick sampling loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::debug;

use crate::collector::{self, CollectError, CounterSource, FileSystem};
use crate::report::Reporter;
use crate::session::Session;

/// Scheduler state. The first tick primes the baseline generation;
/// every later tick reports a real interval. The transition happens
/// after the first collection whether or not it was displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Priming,
    Steady,
}

/// Drives collect → aggregate → report → swap → sleep until the
/// configured report count is exhausted or the shutdown flag drops.
pub struct Sampler<F> {
    fs: F,
    proc_path: String,
    interval: Duration,
    /// Displayed reports to produce; 0 means run until shutdown.
    count: u64,
    running: Arc<AtomicBool>,
}

impl<F: FileSystem> Sampler<F> {
    pub fn new(fs: F, proc_path: impl Into<String>, interval: Duration, count: u64) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            interval,
            count,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Shares a shutdown flag with a signal handler; dropping it ends
    /// the run after the current tick.
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.running = flag;
        self
    }

    pub fn run(
        &self,
        session: &mut Session,
        source: &dyn CounterSource,
        reporter: &mut dyn Reporter,
    ) -> Result<(), CollectError> {
        let mut phase = Phase::Priming;
        let mut remaining = self.count;
        // The since-boot report can only be skipped when a real
        // interval follows it.
        let suppress_priming = session.config().omit_since_boot && !self.interval.is_zero();

        loop {
            collector::collect_cpu(&self.fs, &self.proc_path, session)?;
            session.begin_collection();
            source.collect_into(session)?;
            session.end_collection();
            if session.config().group.is_some() {
                session.aggregate_groups();
            }

            if phase == Phase::Priming && suppress_priming {
                debug!("priming report suppressed");
            } else {
                reporter.report(session);
                if self.count > 0 {
                    remaining -= 1;
                    if remaining == 0 {
                        break;
                    }
                }
            }
            phase = Phase::Steady;

            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            session.swap_generations();
            self.sleep_between_ticks();
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
        }

        Ok(())
    }

    /// Sliced sleep so a shutdown signal wakes the loop early. An
    /// early wake is not drift-compensated; the next tick just runs.
    fn sleep_between_ticks(&self) {
        let slice = Duration::from_millis(100);
        let mut remaining = self.interval;
        while remaining > Duration::ZERO && self.running.load(Ordering::SeqCst) {
            let nap = remaining.min(slice);
            std::thread::sleep(nap);
            remaining = remaining.saturating_sub(nap);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use crate::config::Config;
    use crate::rates;
    use crate::store::model::IoCounters;

    /// Serves scripted stat/uptime content, one entry per tick; the
    /// last entry repeats.
    struct CpuFeed {
        stats: Vec<&'static str>,
        stat_reads: Mutex<usize>,
    }

    impl CpuFeed {
        fn new(stats: Vec<&'static str>) -> Self {
            Self {
                stats,
                stat_reads: Mutex::new(0),
            }
        }
    }

    impl FileSystem for CpuFeed {
        fn read_to_string(&self, path: &Path) -> io::Result<String> {
            if path == Path::new("/proc/stat") {
                let mut reads = self.stat_reads.lock().unwrap();
                let idx = (*reads).min(self.stats.len() - 1);
                *reads += 1;
                Ok(self.stats[idx].to_string())
            } else {
                Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))
            }
        }

        fn exists(&self, _path: &Path) -> bool {
            false
        }

        fn read_dir(&self, _path: &Path) -> io::Result<Vec<PathBuf>> {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such dir"))
        }
    }

    /// Upserts a scripted row set per tick; the last set repeats.
    struct ScriptedSource {
        ticks: Vec<Vec<(&'static str, IoCounters)>>,
        tick: Mutex<usize>,
    }

    impl ScriptedSource {
        fn new(ticks: Vec<Vec<(&'static str, IoCounters)>>) -> Self {
            Self {
                ticks,
                tick: Mutex::new(0),
            }
        }
    }

    impl CounterSource for ScriptedSource {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn device_count(&self) -> Result<usize, CollectError> {
            Ok(self.ticks.iter().map(Vec::len).max().unwrap_or(0))
        }

        fn collect_into(&self, session: &mut Session) -> Result<(), CollectError> {
            let mut tick = self.tick.lock().unwrap();
            let idx = (*tick).min(self.ticks.len() - 1);
            *tick += 1;
            for (name, row) in &self.ticks[idx] {
                session.save_stats(name, *row);
            }
            Ok(())
        }
    }

    /// Captures each displayed report as (device, reads-per-second).
    #[derive(Default)]
    struct CaptureReporter {
        reports: Vec<Vec<(String, f64)>>,
    }

    impl Reporter for CaptureReporter {
        fn report(&mut self, session: &Session) {
            let itv = session.disk_interval();
            let tps = session.config().ticks_per_sec;
            let rows = session
                .devices()
                .iter()
                .filter(|(_, s)| s.header.used)
                .map(|(_, s)| {
                    (
                        s.header.name.clone(),
                        rates::per_second(
                            s.counters.previous().rd_ios,
                            s.counters.current().rd_ios,
                            itv,
                            tps,
                        ),
                    )
                })
                .collect();
            self.reports.push(rows);
        }
    }

    fn rd(rd_ios: u64) -> IoCounters {
        IoCounters {
            rd_ios,
            ..Default::default()
        }
    }

    // One processor, one second of user time between ticks.
    const STAT_T1: &str = "cpu  1000 0 0 0 0 0 0 0 0 0\ncpu0 1000 0 0 0 0 0 0 0 0 0\n";
    const STAT_T2: &str = "cpu  1100 0 0 0 0 0 0 0 0 0\ncpu0 1100 0 0 0 0 0 0 0 0 0\n";
    const STAT_T3: &str = "cpu  1200 0 0 0 0 0 0 0 0 0\ncpu0 1200 0 0 0 0 0 0 0 0 0\n";

    #[test]
    fn suppressed_priming_tick_still_becomes_the_baseline() {
        let fs = CpuFeed::new(vec![STAT_T1, STAT_T2]);
        let source = ScriptedSource::new(vec![vec![("sda", rd(100))], vec![("sda", rd(150))]]);
        let config = Config {
            omit_since_boot: true,
            ..Config::default()
        };
        let mut session = Session::new(config, 4, 1);
        let mut reporter = CaptureReporter::default();

        let sampler = Sampler::new(fs, "/proc", Duration::from_millis(1), 1);
        sampler.run(&mut session, &source, &mut reporter).unwrap();

        // Only the second tick was displayed, and its rate covers the
        // tick-1 → tick-2 delta, not the since-boot totals.
        assert_eq!(reporter.reports.len(), 1);
        assert_eq!(reporter.reports[0], vec![("sda".to_string(), 50.0)]);
    }

    #[test]
    fn count_limits_displayed_reports_exactly() {
        let fs = CpuFeed::new(vec![STAT_T1, STAT_T2, STAT_T3]);
        let source = ScriptedSource::new(vec![
            vec![("sda", rd(100))],
            vec![("sda", rd(150))],
            vec![("sda", rd(250))],
        ]);
        let mut session = Session::new(Config::default(), 4, 1);
        let mut reporter = CaptureReporter::default();

        let sampler = Sampler::new(fs, "/proc", Duration::from_millis(1), 3);
        sampler.run(&mut session, &source, &mut reporter).unwrap();

        assert_eq!(reporter.reports.len(), 3);
        // First report averages since boot: 100 reads over 10 seconds.
        assert_eq!(reporter.reports[0], vec![("sda".to_string(), 10.0)]);
        assert_eq!(reporter.reports[1], vec![("sda".to_string(), 50.0)]);
        assert_eq!(reporter.reports[2], vec![("sda".to_string(), 100.0)]);
    }

    #[test]
    fn dropped_shutdown_flag_ends_an_unbounded_run() {
        let fs = CpuFeed::new(vec![STAT_T1]);
        let source = ScriptedSource::new(vec![vec![("sda", rd(100))]]);
        let mut session = Session::new(Config::default(), 4, 1);
        let mut reporter = CaptureReporter::default();

        let flag = Arc::new(AtomicBool::new(false));
        let sampler = Sampler::new(fs, "/proc", Duration::from_secs(3600), 0)
            .with_shutdown_flag(flag);
        sampler.run(&mut session, &source, &mut reporter).unwrap();

        // The tick in flight still completes and reports.
        assert_eq!(reporter.reports.len(), 1);
    }

    #[test]
    fn groups_are_aggregated_every_tick() {
        let fs = CpuFeed::new(vec![STAT_T1, STAT_T2]);
        let source = ScriptedSource::new(vec![
            vec![("sda", rd(10)), ("sdb", rd(20))],
            vec![("sda", rd(30)), ("sdb", rd(40))],
        ]);
        let config = Config {
            group: Some("G".to_string()),
            ..Config::default()
        };
        let mut session = Session::new(config, 8, 1);
        let mut reporter = CaptureReporter::default();

        let sampler = Sampler::new(fs, "/proc", Duration::from_millis(1), 2);
        sampler.run(&mut session, &source, &mut reporter).unwrap();

        let last = &reporter.reports[1];
        // 20 + 20 reads across the group over one second.
        let group_rate = last.iter().find(|(name, _)| name == "G").unwrap().1;
        assert_eq!(group_rate, 40.0);
    }
}
