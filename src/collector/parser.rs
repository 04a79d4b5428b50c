//! Pure parsers for both kernel counter sources.
//!
//! These functions parse pseudo-file content into structured rows and
//! are testable with string inputs. Field layouts:
//!
//! - table source, full line (14 fields):
//!   `major minor name rd_ios rd_merges rd_sectors rd_ticks wr_ios
//!    wr_merges wr_sectors wr_ticks ios_in_progress tot_ticks rq_ticks`
//! - table source, legacy partition line (7 fields):
//!   `major minor name rd_ios rd_sectors wr_ios wr_sectors`
//! - per-device stat file: the same counter sets without the
//!   `major minor name` prefix (11 or 4 fields).

use std::fmt;

use crate::store::model::{CpuCounters, IoCounters};

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// One decoded counter row: the full extended set, or the legacy
/// four-counter form partitions without extended stats report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatLine {
    Full(IoCounters),
    Partial {
        rd_ios: u64,
        rd_sectors: u64,
        wr_ios: u64,
        wr_sectors: u64,
    },
}

impl StatLine {
    /// Normalizes to the common counter shape. Fields absent from the
    /// legacy form stay zero.
    pub fn into_counters(self) -> IoCounters {
        match self {
            StatLine::Full(counters) => counters,
            StatLine::Partial {
                rd_ios,
                rd_sectors,
                wr_ios,
                wr_sectors,
            } => IoCounters {
                rd_ios,
                rd_sectors,
                wr_ios,
                wr_sectors,
                ..Default::default()
            },
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, StatLine::Partial { .. })
    }
}

/// One parsed table-source row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub major: u32,
    pub minor: u32,
    pub name: String,
    pub stat: StatLine,
}

fn num(fields: &[&str], idx: usize) -> Result<u64, ParseError> {
    fields[idx]
        .parse()
        .map_err(|_| ParseError::new(format!("field {} is not a counter: {:?}", idx, fields[idx])))
}

fn counters_from(fields: &[&str], offset: usize) -> Result<IoCounters, ParseError> {
    Ok(IoCounters {
        rd_ios: num(fields, offset)?,
        rd_merges: num(fields, offset + 1)?,
        rd_sectors: num(fields, offset + 2)?,
        rd_ticks: num(fields, offset + 3)?,
        wr_ios: num(fields, offset + 4)?,
        wr_merges: num(fields, offset + 5)?,
        wr_sectors: num(fields, offset + 6)?,
        wr_ticks: num(fields, offset + 7)?,
        ios_in_progress: num(fields, offset + 8)?,
        tot_ticks: num(fields, offset + 9)?,
        rq_ticks: num(fields, offset + 10)?,
    })
}

fn partial_from(fields: &[&str], offset: usize) -> Result<StatLine, ParseError> {
    Ok(StatLine::Partial {
        rd_ios: num(fields, offset)?,
        rd_sectors: num(fields, offset + 1)?,
        wr_ios: num(fields, offset + 2)?,
        wr_sectors: num(fields, offset + 3)?,
    })
}

/// Parses one table-source line. Any field count other than 14 or 7
/// is malformed; the caller skips the line.
pub fn parse_table_line(line: &str) -> Result<TableRow, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();

    let stat = match fields.len() {
        14 => StatLine::Full(counters_from(&fields, 3)?),
        7 => partial_from(&fields, 3)?,
        n => return Err(ParseError::new(format!("unexpected field count {}", n))),
    };

    let major: u32 = fields[0]
        .parse()
        .map_err(|_| ParseError::new(format!("invalid major {:?}", fields[0])))?;
    let minor: u32 = fields[1]
        .parse()
        .map_err(|_| ParseError::new(format!("invalid minor {:?}", fields[1])))?;

    Ok(TableRow {
        major,
        minor,
        name: fields[2].to_string(),
        stat,
    })
}

/// Parses one per-device stat file (11-field full or 4-field legacy).
pub fn parse_stat_file(content: &str) -> Result<StatLine, ParseError> {
    let fields: Vec<&str> = content.split_whitespace().collect();
    match fields.len() {
        11 => Ok(StatLine::Full(counters_from(&fields, 0)?)),
        4 => partial_from(&fields, 0),
        n => Err(ParseError::new(format!("unexpected field count {}", n))),
    }
}

/// The aggregate and first-processor rows of the stat pseudo-file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuStat {
    pub all: CpuCounters,
    pub cpu0: CpuCounters,
}

fn cpu_row(rest: &str) -> Result<CpuCounters, ParseError> {
    let fields: Vec<&str> = rest.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(ParseError::new(format!(
            "cpu row too short: {} fields",
            fields.len()
        )));
    }
    // Older kernels report fewer trailing fields; missing ones are 0.
    let opt = |idx: usize| -> Result<u64, ParseError> {
        if idx < fields.len() { num(&fields, idx) } else { Ok(0) }
    };
    Ok(CpuCounters {
        user: num(&fields, 0)?,
        nice: num(&fields, 1)?,
        system: num(&fields, 2)?,
        idle: num(&fields, 3)?,
        iowait: opt(4)?,
        irq: opt(5)?,
        softirq: opt(6)?,
        steal: opt(7)?,
        guest: opt(8)?,
        guest_nice: opt(9)?,
    })
}

/// Parses the stat pseudo-file's CPU rows. The aggregate row is
/// required; the cpu0 row defaults to zero when absent.
pub fn parse_cpu_stat(content: &str) -> Result<CpuStat, ParseError> {
    let mut stat = CpuStat::default();
    let mut seen_all = false;

    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("cpu ") {
            stat.all = cpu_row(rest)?;
            seen_all = true;
        } else if let Some(rest) = line.strip_prefix("cpu0 ") {
            stat.cpu0 = cpu_row(rest)?;
        }
    }

    if !seen_all {
        return Err(ParseError::new("missing aggregate cpu row"));
    }
    Ok(stat)
}

/// Parses the uptime pseudo-file into clock ticks. The file carries
/// seconds with centisecond precision.
pub fn parse_uptime(content: &str, ticks_per_sec: u64) -> Result<u64, ParseError> {
    let first = content
        .split_whitespace()
        .next()
        .ok_or_else(|| ParseError::new("empty uptime"))?;

    let (secs, frac) = first.split_once('.').unwrap_or((first, "0"));
    let secs: u64 = secs
        .parse()
        .map_err(|_| ParseError::new(format!("invalid uptime {:?}", first)))?;
    let centis: u64 = frac
        .chars()
        .take(2)
        .collect::<String>()
        .parse()
        .map_err(|_| ParseError::new(format!("invalid uptime fraction {:?}", frac)))?;

    Ok(secs * ticks_per_sec + centis * ticks_per_sec / 100)
}
