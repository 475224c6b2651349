//! Configuration for the taskpulse server.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskpulse/config.toml`)
//! 4. Compiled defaults

use std::path::PathBuf;
use std::time::Duration;

use crate::broadcaster::DEFAULT_BROADCAST_INTERVAL;
use crate::topics::DEFAULT_TOPIC_CAPACITY;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerFileConfig,
    metrics: MetricsFileConfig,
    app: AppFileConfig,
}

/// `[server]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    topic_capacity: Option<usize>,
}

/// `[metrics]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct MetricsFileConfig {
    broadcast_interval_ms: Option<u64>,
    memory_limit_mb: Option<u64>,
}

/// `[app]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct AppFileConfig {
    name: Option<String>,
    environment: Option<String>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Task tracking server with live metrics")]
pub struct CliArgs {
    /// Address to bind the HTTP server to.
    #[arg(short, long, env = "TASKPULSE_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/taskpulse/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Milliseconds between metrics broadcasts.
    #[arg(long)]
    pub broadcast_interval_ms: Option<u64>,

    /// Per-topic buffer before slow subscribers skip messages.
    #[arg(long)]
    pub topic_capacity: Option<usize>,

    /// Memory ceiling reported as the heap maximum, in MB.
    #[arg(long)]
    pub memory_limit_mb: Option<u64>,

    /// Deployment environment label.
    #[arg(long, env = "TASKPULSE_ENVIRONMENT")]
    pub environment: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKPULSE_LOG")]
    pub log_level: String,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to (e.g., `0.0.0.0:8080`).
    pub bind_addr: String,
    /// Time between metrics broadcasts.
    pub broadcast_interval: Duration,
    /// Per-topic channel capacity.
    pub topic_capacity: usize,
    /// Reported process memory ceiling in MB; host total when unset.
    pub memory_limit_mb: Option<u64>,
    /// Application name for `/api/v1/info`.
    pub app_name: String,
    /// Environment label for `/api/v1/info`.
    pub environment: String,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            broadcast_interval: DEFAULT_BROADCAST_INTERVAL,
            topic_capacity: DEFAULT_TOPIC_CAPACITY,
            memory_limit_mb: None,
            app_name: "taskpulse".to_string(),
            environment: "development".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and a missing
    /// file is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            broadcast_interval: cli
                .broadcast_interval_ms
                .or(file.metrics.broadcast_interval_ms)
                .map_or(defaults.broadcast_interval, Duration::from_millis),
            topic_capacity: cli
                .topic_capacity
                .or(file.server.topic_capacity)
                .unwrap_or(defaults.topic_capacity),
            memory_limit_mb: cli.memory_limit_mb.or(file.metrics.memory_limit_mb),
            app_name: file.app.name.clone().unwrap_or(defaults.app_name),
            environment: cli
                .environment
                .clone()
                .or_else(|| file.app.environment.clone())
                .unwrap_or(defaults.environment),
            log_level: cli.log_level.clone(),
        }
    }
}

fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("taskpulse").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
