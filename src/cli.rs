//! CLI arguments and subcommands for herakles-proc-cpu-sampler.
//!
//! With no arguments the sampler runs until interrupted. Everything here is
//! optional tooling around that default.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-proc-cpu-sampler",
    about = "100 Hz per-core CPU and top-5 process CPU sampler",
    long_about = "100 Hz per-core CPU and top-5 process CPU sampler.\n\n\
                  Samples /proc every 10 ms and prints per-core utilization plus the \
                  five most CPU-intensive processes of each interval, to catch spikes \
                  that 1-15 s dashboards average away. Samples go to stdout, \
                  diagnostics to stderr.",
    author = "Michael Moll <proc-mem@herakles.io> - Herakles IO",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level (overrides config)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Read counters below this directory instead of /proc
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Do not pin the sampler to the last core
    #[arg(long)]
    pub no_pin: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and system requirements
    Check {
        /// Check the /proc counter sources
        #[arg(long)]
        proc: bool,

        /// Check that the sampler can pin itself to the last core
        #[arg(long)]
        affinity: bool,

        /// Check all system requirements
        #[arg(long)]
        all: bool,
    },

    /// Run a fixed number of intervals and print loop statistics
    Test {
        /// Number of intervals to sample
        #[arg(short = 'n', long, default_value_t = 100)]
        iterations: u64,

        /// Show snapshot details after the run
        #[arg(long)]
        verbose: bool,
    },
}
