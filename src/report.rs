//! Line-oriented sample stream written to stdout.
//!
//! ```text
//! HH:MM:SS:UU	cpu_0	cpu_1
//! 14:03:27:41	 7%	100%
//!     pid=4711 cc1plus              48.8%
//! ```

use chrono::{DateTime, TimeZone, Timelike};
use std::fmt::Write as FmtWrite;

use crate::delta::UsageRecord;

/// Label of the timestamp column.
pub const TIMESTAMP_LABEL: &str = "HH:MM:SS:UU";

/// Column width of the process name in the top-5 lines.
pub const NAME_WIDTH: usize = 20;

/// Appends `HH:MM:SS:CC` where CC is hundredths of a second.
pub fn format_timestamp<Tz: TimeZone>(now: &DateTime<Tz>, out: &mut String) {
    // nanosecond() exceeds 1e9 during a leap second
    let centis = (now.nanosecond() / 10_000_000).min(99);
    write!(
        out,
        "{:02}:{:02}:{:02}:{:02}",
        now.hour(),
        now.minute(),
        now.second(),
        centis
    )
    .ok();
}

/// Appends the column header line.
pub fn write_header(out: &mut String, cores: usize) {
    out.push_str(TIMESTAMP_LABEL);
    for core in 0..cores {
        write!(out, "\tcpu_{}", core).ok();
    }
    out.push('\n');
}

/// Appends one interval: the timestamped per-core line, then one line per
/// top process.
pub fn write_interval<Tz: TimeZone>(
    out: &mut String,
    now: &DateTime<Tz>,
    core_usage: &[f64],
    top: &[UsageRecord],
) {
    format_timestamp(now, out);
    for usage in core_usage {
        write!(out, "\t{:2.0}%", usage).ok();
    }
    out.push('\n');

    for record in top {
        writeln!(
            out,
            "    pid={} {:<width$} {:.1}%",
            record.pid,
            record.name,
            record.percent,
            width = NAME_WIDTH
        )
        .ok();
    }
}
