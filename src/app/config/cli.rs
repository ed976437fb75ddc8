use super::{ConfigError, LogLevel};
use crate::reliability::RetryConfig;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Flat configuration surface: CLI flags with env-var fallbacks, optionally
/// replaced wholesale by a TOML file via `--config-file`.
#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(author, version, about = "Reliability backbone for a telemetry pipeline", long_about = None)]
#[serde(default)]
pub struct Config {
    /// Collector endpoint URL
    #[arg(
        long,
        env = "RELAY_ENDPOINT",
        default_value = "http://localhost:9600/v1/telemetry"
    )]
    pub endpoint: String,

    /// Records the queue holds before dropping new ones
    #[arg(long, env = "MAX_QUEUE_SIZE", default_value = "2048")]
    pub max_queue_size: usize,

    /// Records per export batch
    #[arg(long, env = "MAX_EXPORT_BATCH_SIZE", default_value = "512")]
    pub max_export_batch_size: usize,

    /// Maximum interval between exports in milliseconds
    #[arg(long, env = "SCHEDULED_DELAY_MS", default_value = "5000")]
    pub scheduled_delay_ms: u64,

    /// Export call timeout in milliseconds
    #[arg(long, env = "EXPORT_TIMEOUT_MS", default_value = "30000")]
    pub export_timeout_ms: u64,

    /// Budget for draining the queue at shutdown, in milliseconds
    #[arg(long, env = "SHUTDOWN_TIMEOUT_MS", default_value = "10000")]
    pub shutdown_timeout_ms: u64,

    /// Directory for durably persisted batches
    #[arg(
        long,
        env = "STORAGE_DIR",
        default_value = "/tmp/telemetry-relay/storage"
    )]
    pub storage_dir: PathBuf,

    /// Storage quota in bytes
    #[arg(long, env = "MAX_STORAGE_BYTES", default_value = "52428800")]
    pub max_storage_bytes: u64,

    /// Maintenance sweep period in seconds
    #[arg(long, env = "MAINTENANCE_INTERVAL_SECS", default_value = "120")]
    pub maintenance_interval_secs: u64,

    /// Retention for persisted batches in seconds
    #[arg(long, env = "RETENTION_SECS", default_value = "172800")]
    pub retention_secs: u64,

    /// Age at which an in-progress write counts as abandoned, in seconds
    #[arg(long, env = "WRITE_TIMEOUT_SECS", default_value = "60")]
    pub write_timeout_secs: u64,

    /// Lease period taken on persisted batches during retry, in seconds
    #[arg(long, env = "LEASE_SECS", default_value = "600")]
    pub lease_secs: u64,

    /// Pause between retry-drain cycles in seconds
    #[arg(long, env = "DRAIN_INTERVAL_SECS", default_value = "30")]
    pub drain_interval_secs: u64,

    /// Compress persisted batches and large HTTP payloads
    #[arg(long, env = "ENABLE_COMPRESSION")]
    pub enable_compression: bool,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Configuration file path (optional)
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Retry backoff (not exposed as CLI args)
    #[serde(default)]
    #[arg(skip)]
    pub retry_config: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9600/v1/telemetry".to_string(),
            max_queue_size: 2048,
            max_export_batch_size: 512,
            scheduled_delay_ms: 5000,
            export_timeout_ms: 30_000,
            shutdown_timeout_ms: 10_000,
            storage_dir: PathBuf::from("/tmp/telemetry-relay/storage"),
            max_storage_bytes: 52_428_800,
            maintenance_interval_secs: 120,
            retention_secs: 172_800,
            write_timeout_secs: 60,
            lease_secs: 600,
            drain_interval_secs: 30,
            enable_compression: false,
            log_level: LogLevel::Info,
            config_file: None,
            retry_config: RetryConfig::default(),
        }
    }
}

impl Config {
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Config::parse_from(args);
        let config = match &config.config_file {
            Some(path) => Self::from_file(path)?,
            None => config,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }
}
