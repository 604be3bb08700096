//! Test command implementation.
//!
//! Runs the real sampler for a fixed number of intervals, then reports how
//! the loop kept up with its 10 ms budget.

use anyhow::Result;
use herakles_proc_cpu_sampler::sampler::{run, Sampler};
use herakles_proc_cpu_sampler::system::{apply_affinity, cpu_core_count, CounterSource};
use std::io;
use std::time::Instant;
use tracing::info;

use crate::config::Config;

/// Samples `iterations` intervals to stdout and prints loop statistics.
pub async fn command_test(iterations: u64, verbose: bool, config: &Config) -> Result<()> {
    let cores = cpu_core_count()?;
    if config.pin_cpu() {
        apply_affinity(cores, config.strict_affinity())?;
    }

    let source = CounterSource::open(config.proc_root(), config.max_processes)?;
    let mut sampler = Sampler::new(source, cores);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    let start = Instant::now();
    sampler.warmup(&mut out)?;
    let done = run(&mut sampler, &mut out, std::future::pending(), Some(iterations)).await?;
    let elapsed = start.elapsed();
    drop(out);

    eprintln!();
    eprintln!("🧪 Herakles Process CPU Sampler - Test Mode");
    eprintln!("============================================");
    eprintln!(
        "   ⏱️  {} intervals in {:.2}ms ({:.1} Hz effective)",
        done,
        elapsed.as_secs_f64() * 1000.0,
        done as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );

    if verbose {
        let previous = sampler.previous();
        eprintln!("   📊 Last snapshot:");
        eprintln!("      ├─ Cores: {}", previous.cores().len());
        eprintln!("      ├─ Processes read: {}", previous.processes().len());
        eprintln!("      ├─ Processes skipped: {}", previous.processes().skipped());
        eprintln!("      ├─ Indexed pids: {}", previous.index().len());
        eprintln!("      └─ Snapshot capacity: {}", previous.processes().capacity());
    }

    let stats = sampler.shutdown();
    if let Some(table) = config.exit_summary(&stats) {
        eprintln!();
        eprint!("{}", table);
    }

    info!("Test run completed: {} intervals", done);
    Ok(())
}
