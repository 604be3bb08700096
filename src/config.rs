//! Configuration loading and validation.
//!
//! Precedence is CLI > config file > defaults. The sampling period and the
//! number of ranked processes are fixed and deliberately absent here.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;

use crate::cli::{Args, ConfigFormat, LogLevel};
use herakles_proc_cpu_sampler::stats::LoopStats;
use herakles_proc_cpu_sampler::system::DEFAULT_PROC_ROOT;

const DEFAULT_LOG_LEVEL: &str = "info";

/// Searched in order when no --config is given.
const DEFAULT_CONFIG_PATHS: [&str; 6] = [
    "/etc/herakles/proc-cpu-sampler.yaml",
    "/etc/herakles/proc-cpu-sampler.yml",
    "/etc/herakles/proc-cpu-sampler.json",
    "./herakles-proc-cpu-sampler.yaml",
    "./herakles-proc-cpu-sampler.yml",
    "./herakles-proc-cpu-sampler.json",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Counter sources
    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,
    /// Stop reading processes after this many per sample
    #[serde(alias = "max-processes")]
    pub max_processes: Option<usize>,

    // Affinity
    #[serde(alias = "pin-cpu")]
    pub pin_cpu: Option<bool>,
    /// Treat a failed pin as fatal instead of a warning
    #[serde(alias = "strict-affinity")]
    pub strict_affinity: Option<bool>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,
    /// Print the loop statistics table to stderr on exit
    #[serde(alias = "summary-on-exit")]
    pub summary_on_exit: Option<bool>,

    /// File this configuration was loaded from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
            max_processes: None,
            pin_cpu: Some(true),
            strict_affinity: Some(false),
            log_level: Some(DEFAULT_LOG_LEVEL.into()),
            summary_on_exit: Some(true),
            source: None,
        }
    }
}

impl Config {
    pub fn proc_root(&self) -> &Path {
        self.proc_root
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_PROC_ROOT))
    }

    pub fn pin_cpu(&self) -> bool {
        self.pin_cpu.unwrap_or(true)
    }

    pub fn strict_affinity(&self) -> bool {
        self.strict_affinity.unwrap_or(false)
    }

    pub fn summary_on_exit(&self) -> bool {
        self.summary_on_exit.unwrap_or(true)
    }

    /// The loop statistics table, if it should be printed at exit.
    pub fn exit_summary(&self, stats: &LoopStats) -> Option<String> {
        self.summary_on_exit().then(|| stats.render_table())
    }

    pub fn level_filter(&self) -> LevelFilter {
        parse_level(self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL))
            .unwrap_or(LevelFilter::INFO)
    }
}

fn parse_level(level: &str) -> Option<LevelFilter> {
    match level.to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::OFF),
        "error" => Some(LevelFilter::ERROR),
        "warn" => Some(LevelFilter::WARN),
        "info" => Some(LevelFilter::INFO),
        "debug" => Some(LevelFilter::DEBUG),
        "trace" => Some(LevelFilter::TRACE),
        _ => None,
    }
}

fn log_level_name(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Off => "off",
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<()> {
    if cfg.proc_root().as_os_str().is_empty() {
        bail!("proc_root must not be empty");
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if parse_level(level).is_none() {
            bail!(
                "Invalid log_level '{}', expected off, error, warn, info, debug or trace",
                level
            );
        }
    }

    if cfg.max_processes == Some(0) {
        bail!("max_processes must be at least 1 when set");
    }

    if cfg.strict_affinity() && !cfg.pin_cpu() {
        bail!("strict_affinity requires pin_cpu to be enabled");
    }

    Ok(())
}

/// Loads a config file, picking the parser by extension (YAML by default).
///
/// Without an explicit path the default locations are tried; finding none
/// yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                bail!("Config file not found: {}", p.display());
            }
            p.to_path_buf()
        }
        None => match DEFAULT_CONFIG_PATHS.iter().find(|p| Path::new(p).exists()) {
            Some(p) => PathBuf::from(p),
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let mut config = parse_config(&content, &path)?;
    config.source = Some(path);
    Ok(config)
}

fn parse_config(content: &str, path: &Path) -> Result<Config> {
    let config: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(content)
            .with_context(|| format!("Invalid JSON config {}", path.display()))?,
        Some("toml") => toml::from_str(content)
            .with_context(|| format!("Invalid TOML config {}", path.display()))?,
        _ => serde_yaml::from_str(content)
            .with_context(|| format!("Invalid YAML config {}", path.display()))?,
    };
    Ok(config)
}

/// Resolves configuration from CLI args, config file, and defaults
pub fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
    }

    if let Some(level) = args.log_level {
        config.log_level = Some(log_level_name(level).to_string());
    }

    if args.no_pin {
        config.pin_cpu = Some(false);
        config.strict_affinity = Some(false);
    }

    Ok(config)
}

/// Renders configuration in the requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<String> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(output)
}
