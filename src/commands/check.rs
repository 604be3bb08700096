//! Check command implementation.
//!
//! Verifies that every data source the sampler depends on is present and
//! parseable before committing to a long run.

use anyhow::{bail, Result};
use herakles_proc_cpu_sampler::system::{
    cpu_core_count, pin_to_last_cpu, CoreSample, CounterSource, ProcessSnapshot,
};
use std::time::Instant;
use tracing::debug;

use crate::config::{validate_effective_config, Config};

/// Validates system requirements and configuration
pub fn command_check(proc: bool, affinity: bool, all: bool, config: &Config) -> Result<()> {
    println!("🔍 Herakles Process CPU Sampler - System Check");
    println!("===============================================");

    let mut all_ok = true;

    println!("\n🧮 Checking CPU cores...");
    let cores = match cpu_core_count() {
        Ok(n) => {
            println!("   ✅ {} cores configured", n);
            Some(n)
        }
        Err(e) => {
            println!("   ❌ {:#}", e);
            all_ok = false;
            None
        }
    };

    // Always checked; --proc adds the process scan.
    let root = config.proc_root();
    println!("\n📁 Checking counter sources under {}...", root.display());
    match CounterSource::open(root, config.max_processes) {
        Ok(mut source) => {
            println!("   ✅ {}/stat and {} opened", root.display(), root.display());

            if let Some(n) = cores {
                let mut samples = vec![CoreSample::default(); n];
                match source.sample_cores(&mut samples) {
                    Ok(()) => println!("   ✅ Parsed counters for {} cores", n),
                    Err(e) => {
                        println!("   ❌ {:#}", e);
                        all_ok = false;
                    }
                }
            }

            if proc || all {
                let mut snapshot = ProcessSnapshot::default();
                let start = Instant::now();
                source.sample_processes(&mut snapshot);
                let elapsed = start.elapsed();
                debug!("Process scan took {:?}", elapsed);

                if snapshot.is_empty() {
                    println!("   ❌ Cannot read any process entries");
                    all_ok = false;
                } else {
                    println!(
                        "   ✅ Read {} processes ({} skipped) in {:.2}ms",
                        snapshot.len(),
                        snapshot.skipped(),
                        elapsed.as_secs_f64() * 1000.0
                    );
                }
            }
        }
        Err(e) => {
            println!("   ❌ {:#}", e);
            all_ok = false;
        }
    }

    if affinity || all {
        println!("\n📌 Checking CPU affinity...");
        match cores.map(pin_to_last_cpu) {
            Some(Ok(())) => println!("   ✅ Pinned to cpu{}", cores.unwrap_or(1) - 1),
            Some(Err(e)) => {
                if config.strict_affinity() {
                    println!("   ❌ Cannot pin: {} (strict_affinity is set)", e);
                    all_ok = false;
                } else {
                    println!("   ⚠️  Cannot pin: {} (sampler will run unpinned)", e);
                }
            }
            None => println!("   ⚠️  Skipped, core count unknown"),
        }
    }

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(()) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review the output above");
        bail!("system check failed");
    }
}
