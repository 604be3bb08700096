//! The 100 Hz sampling loop.
//!
//! Two buffer sets alternate between the "previous" and "current" roles.
//! Each iteration refills the current set, diffs it against the previous
//! one, prints the result, then swaps the two by value so nothing is copied
//! or reallocated once the buffers have reached their working size.

use anyhow::{bail, Result};
use chrono::Local;
use std::future::Future;
use std::io::Write;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, instrument, trace};

use crate::delta::{core_usage_into, process_usage_into, total_tick_delta, UsageRecord};
use crate::index::IdentityIndex;
use crate::report;
use crate::stats::LoopStats;
use crate::system::{CoreSample, CounterSource, ProcessSnapshot, INITIAL_PROCESS_CAPACITY};
use crate::topk::{top5, TOP_K};

/// Delay between the end of one iteration and the start of the next.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Buffers allocated, nothing sampled yet.
    Init,
    /// Taking the baseline sample.
    Warmup,
    /// Emitting one interval per iteration.
    Steady,
    Shutdown,
}

/// Everything read at one sampling instant.
#[derive(Debug)]
pub struct BufferSet {
    cores: Vec<CoreSample>,
    processes: ProcessSnapshot,
    index: IdentityIndex,
}

impl BufferSet {
    fn new(cores: usize) -> Self {
        Self {
            cores: vec![CoreSample::default(); cores],
            processes: ProcessSnapshot::with_capacity(INITIAL_PROCESS_CAPACITY),
            index: IdentityIndex::with_capacity(INITIAL_PROCESS_CAPACITY),
        }
    }

    fn fill(&mut self, source: &mut CounterSource) -> Result<()> {
        source.sample_cores(&mut self.cores)?;
        source.sample_processes(&mut self.processes);
        self.index.rebuild(&self.processes);
        Ok(())
    }

    pub fn cores(&self) -> &[CoreSample] {
        &self.cores
    }

    pub fn processes(&self) -> &ProcessSnapshot {
        &self.processes
    }

    pub fn index(&self) -> &IdentityIndex {
        &self.index
    }
}

/// Owns the counter source, both buffer sets and all scratch space.
pub struct Sampler {
    source: CounterSource,
    previous: BufferSet,
    current: BufferSet,
    core_usage: Vec<f64>,
    usage: Vec<UsageRecord>,
    line: String,
    stats: LoopStats,
    phase: Phase,
}

impl Sampler {
    pub fn new(source: CounterSource, cores: usize) -> Self {
        Self {
            source,
            previous: BufferSet::new(cores),
            current: BufferSet::new(cores),
            core_usage: Vec::with_capacity(cores),
            usage: Vec::with_capacity(INITIAL_PROCESS_CAPACITY),
            line: String::with_capacity(64 + cores * 8),
            stats: LoopStats::new(),
            phase: Phase::Init,
        }
    }

    fn enter(&mut self, phase: Phase) {
        debug!("Sampler phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cores(&self) -> usize {
        self.previous.cores.len()
    }

    /// Baseline for the next interval: the most recent sample.
    pub fn previous(&self) -> &BufferSet {
        &self.previous
    }

    /// Per-core busy percentages of the last interval.
    pub fn core_usage(&self) -> &[f64] {
        &self.core_usage
    }

    /// Busiest processes of the last interval, busiest first.
    pub fn top(&self) -> &[UsageRecord] {
        &self.usage[..self.usage.len().min(TOP_K)]
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Takes the baseline sample into the previous buffers and writes the
    /// header. Produces no interval.
    #[instrument(skip_all)]
    pub fn warmup<W: Write>(&mut self, out: &mut W) -> Result<()> {
        if self.phase != Phase::Init {
            bail!("warmup requested in phase {:?}", self.phase);
        }
        self.enter(Phase::Warmup);

        self.previous.fill(&mut self.source)?;
        debug!(
            "Baseline: {} cores, {} processes ({} skipped)",
            self.previous.cores.len(),
            self.previous.processes.len(),
            self.previous.processes.skipped()
        );

        let cores = self.cores();
        self.line.clear();
        report::write_header(&mut self.line, cores);
        out.write_all(self.line.as_bytes())?;
        out.flush()?;

        self.enter(Phase::Steady);
        Ok(())
    }

    /// One interval: sample, diff against the previous sample, rank, emit,
    /// swap roles.
    pub fn step<W: Write>(&mut self, out: &mut W) -> Result<()> {
        if self.phase != Phase::Steady {
            bail!("step requested in phase {:?}", self.phase);
        }
        let started = Instant::now();

        self.current.fill(&mut self.source)?;

        core_usage_into(&self.previous.cores, &self.current.cores, &mut self.core_usage);
        let total_delta = total_tick_delta(&self.previous.cores, &self.current.cores);
        process_usage_into(
            &self.previous.processes,
            &self.previous.index,
            &self.current.processes,
            total_delta,
            &mut self.usage,
        );
        let top = top5(&mut self.usage);

        self.line.clear();
        report::write_interval(&mut self.line, &Local::now(), &self.core_usage, top);
        out.write_all(self.line.as_bytes())?;
        out.flush()?;

        let work = started.elapsed();
        trace!(
            "Interval: {} ticks, {} processes, {} ranked, {:?}",
            total_delta,
            self.current.processes.len(),
            self.usage.len(),
            work
        );
        self.stats.record(
            work,
            self.current.processes.len(),
            self.current.processes.skipped(),
            SAMPLE_INTERVAL,
        );

        std::mem::swap(&mut self.previous, &mut self.current);
        Ok(())
    }

    /// Releases the counter source and all buffers, returning the run's
    /// statistics.
    pub fn shutdown(mut self) -> LoopStats {
        self.enter(Phase::Shutdown);
        let stats = std::mem::take(&mut self.stats);
        info!(
            "Sampler stopped after {} intervals ({} over budget)",
            stats.iterations(),
            stats.overruns()
        );
        stats
    }
}

/// Steps `sampler` every [`SAMPLE_INTERVAL`] until `shutdown` resolves or
/// `limit` intervals have been emitted.
///
/// The delay is fixed, not a fixed rate: an iteration that runs long is
/// completed and the next one simply starts later. `shutdown` is only
/// observed between iterations.
pub async fn run<W, F>(
    sampler: &mut Sampler,
    out: &mut W,
    shutdown: F,
    limit: Option<u64>,
) -> Result<u64>
where
    W: Write,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut intervals = 0u64;

    while limit.map_or(true, |max| intervals < max) {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                debug!("Shutdown observed after {} intervals", intervals);
                break;
            }
            _ = sleep(SAMPLE_INTERVAL) => {}
        }

        sampler.step(out)?;
        intervals += 1;
    }

    Ok(intervals)
}
