//! Self-measurement of the sampling loop.
//!
//! Tracks how long each iteration's work took and how many processes it
//! read, so an operator can tell whether the 10 ms budget holds on this host.

use std::fmt::Write as FmtWrite;
use std::time::Duration;

#[derive(Clone, Copy, Default, Debug)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }

    pub fn last(&self) -> f64 {
        self.last
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Per-iteration statistics of one sampler run.
#[derive(Clone, Default, Debug)]
pub struct LoopStats {
    work_ms: RunningStat,
    processes: RunningStat,
    skipped: RunningStat,
    overruns: u64,
}

impl LoopStats {
    pub fn new() -> Self {
        Default::default()
    }

    /// Records one completed iteration. `work` over `budget` counts as an
    /// overrun.
    pub fn record(&mut self, work: Duration, processes: usize, skipped: usize, budget: Duration) {
        self.work_ms.add(work.as_secs_f64() * 1000.0);
        self.processes.add(processes as f64);
        self.skipped.add(skipped as f64);
        if work > budget {
            self.overruns += 1;
        }
    }

    pub fn iterations(&self) -> u64 {
        self.work_ms.count()
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn work_ms(&self) -> &RunningStat {
        &self.work_ms
    }

    pub fn processes(&self) -> &RunningStat {
        &self.processes
    }

    pub fn render_table(&self) -> String {
        let left_col = 22usize;
        let col_w = 12usize;

        let mut out = String::new();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "metric",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out, "{}", "-".repeat(left_col + 3 + (col_w + 3) * 4)).ok();

        let rows = [
            ("sample work (ms)", &self.work_ms, 3usize),
            ("processes read", &self.processes, 0),
            ("processes skipped", &self.skipped, 0),
        ];
        for (label, stat, precision) in rows {
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                label,
                format!("{:.*}", precision, stat.last()),
                format!("{:.*}", precision.max(1), stat.avg()),
                format!("{:.*}", precision, stat.max()),
                format!("{:.*}", precision, stat.min()),
                left = left_col,
                col = col_w
            )
            .ok();
        }

        writeln!(out).ok();
        writeln!(out, "number of intervals: {}", self.iterations()).ok();
        writeln!(out, "intervals over budget: {}", self.overruns).ok();

        out
    }
}
