// herakles-proc-cpu-sampler - version 0.1.0
// 100 Hz CPU spike sampler with tracing logging
use anyhow::Result;
use clap::Parser;
use std::io;
use tokio::signal;
use tracing::{debug, info};

use herakles_proc_cpu_sampler::sampler::{run, Sampler, SAMPLE_INTERVAL};
use herakles_proc_cpu_sampler::system::{apply_affinity, cpu_core_count, CounterSource};

mod cli;
mod commands;
mod config;

use cli::{Args, Commands};
use config::{resolve_config, show_config, validate_effective_config, Config};

/// Initializes tracing on stderr; stdout carries the sample stream.
fn setup_logging(config: &Config) {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(config.level_filter())
        .with_writer(io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    debug!("Logging initialized with level: {}", config.level_filter());
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Init -> Warmup -> Steady until interrupted -> Shutdown.
async fn run_sampler(config: &Config) -> Result<()> {
    let cores = cpu_core_count()?;
    if config.pin_cpu() {
        apply_affinity(cores, config.strict_affinity())?;
    }

    let source = CounterSource::open(config.proc_root(), config.max_processes)?;
    let mut sampler = Sampler::new(source, cores);
    info!(
        "Sampling {} cores from {} every {:?}",
        cores,
        config.proc_root().display(),
        SAMPLE_INTERVAL
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    sampler.warmup(&mut out)?;
    run(&mut sampler, &mut out, shutdown_signal(), None).await?;
    drop(out);

    let stats = sampler.shutdown();
    if let Some(table) = config.exit_summary(&stats) {
        eprint!("{}", table);
    }

    info!("herakles-proc-cpu-sampler stopped gracefully");
    Ok(())
}

/// -------------------------------------------------------------------
/// MAIN APPLICATION ENTRY POINT
/// -------------------------------------------------------------------
/// A single thread drives everything; the sleep between intervals is the
/// only suspension point.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    if args.check_config {
        if let Err(e) = validate_effective_config(&config) {
            eprintln!("❌ Configuration invalid: {}", e);
            std::process::exit(1);
        }
        println!("✅ Configuration is valid");
        return Ok(());
    }

    if args.show_config {
        print!("{}", show_config(&config, args.config_format)?);
        return Ok(());
    }

    validate_effective_config(&config)?;
    setup_logging(&config);
    match &config.source {
        Some(path) => info!("Loaded configuration from: {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }

    match &args.command {
        Some(Commands::Check {
            proc,
            affinity,
            all,
        }) => commands::command_check(*proc, *affinity, *all, &config),
        Some(Commands::Test {
            iterations,
            verbose,
        }) => commands::command_test(*iterations, *verbose, &config).await,
        None => run_sampler(&config).await,
    }
}
