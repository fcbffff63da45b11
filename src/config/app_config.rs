//! Processor configuration - store address, worker pool, execution mode
//!
//! Each struct implements `Default` with the values from [`super::defaults`],
//! so a missing config file behaves exactly like the stock deployment.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "TELEMETRY_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "telemetry.toml";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Config parse error ({}): {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Execution Mode
// ============================================================================

/// How the processor runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Run one pass synchronously and exit
    Direct,
    /// Serve `POST /run` / `GET /status` until shut down
    Service,
}

impl ExecutionMode {
    /// Resolve a deployment label such as `native_mt`, `container_st` or
    /// `serverless_mt`. Returns `None` for unrecognized labels.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_lowercase();
        if label == "direct" || label.starts_with("native") || label.starts_with("container") {
            Some(Self::Direct)
        } else if label == "service" || label.starts_with("serverless") {
            Some(Self::Service)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Direct => write!(f, "direct"),
            ExecutionMode::Service => write!(f, "service"),
        }
    }
}

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with [`AppConfig::load`], which searches:
/// 1. `$TELEMETRY_CONFIG`
/// 2. `./telemetry.toml`
/// 3. Built-in defaults
///
/// then apply environment/CLI values with [`AppConfig::apply_overrides`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub workers: WorkerConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Values supplied on the command line or through the environment.
///
/// `None` leaves the file/default value in place.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub store_host: Option<String>,
    pub store_port: Option<u16>,
    pub core_count: Option<usize>,
    pub threaded: Option<bool>,
    pub mode: Option<String>,
    pub http_addr: Option<String>,
}

impl AppConfig {
    /// Load configuration using the standard search order.
    ///
    /// A `$TELEMETRY_CONFIG` pointing at a missing file is logged and skipped.
    /// A file that exists but does not parse or validate is an error.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let p = PathBuf::from(&path);
            if p.exists() {
                let config = Self::load_from_file(&p)?;
                info!(path = %p.display(), "Loaded config from {}", CONFIG_PATH_ENV);
                return Ok(config);
            }
            warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_PATH_ENV);
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            let config = Self::load_from_file(&local)?;
            info!("Loaded config from ./{}", LOCAL_CONFIG_FILE);
            return Ok(config);
        }

        info!("No config file found, using built-in defaults");
        Ok(Self::default())
    }

    /// Load from a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let config: Self =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Layer environment/CLI values on top of the loaded file.
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(host) = overrides.store_host {
            self.store.host = host;
        }
        if let Some(port) = overrides.store_port {
            self.store.port = port;
        }
        if let Some(cores) = overrides.core_count {
            self.workers.core_count = cores;
        }
        if let Some(threaded) = overrides.threaded {
            self.workers.threaded = threaded;
        }
        if let Some(mode) = overrides.mode {
            self.server.mode = mode;
        }
        if let Some(addr) = overrides.http_addr {
            self.server.addr = addr;
        }
    }

    /// Check every setting, collecting all problems rather than the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.store.host.trim().is_empty() {
            errors.push("store.host must not be empty".to_string());
        }
        if self.store.port == 0 {
            errors.push("store.port must be in 1..=65535".to_string());
        }
        if self.store.key_pattern.is_empty() {
            errors.push("store.key_pattern must not be empty".to_string());
        }
        if self.store.result_suffix.is_empty() {
            errors.push("store.result_suffix must not be empty".to_string());
        }
        if self.workers.core_count == 0 {
            errors.push("workers.core_count must be at least 1".to_string());
        }
        if self.analysis.spectrum_bins == 0 {
            errors.push("analysis.spectrum_bins must be at least 1".to_string());
        }
        if ExecutionMode::from_label(&self.server.mode).is_none() {
            errors.push(format!(
                "server.mode '{}' is not a recognized execution mode \
                 (native*, container*, serverless*, direct, service)",
                self.server.mode
            ));
        }
        if self.server.addr.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "server.addr '{}' is not a valid socket address",
                self.server.addr
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Resolved execution mode. Defaults to direct for an unknown label;
    /// [`AppConfig::validate`] rejects those before this is consulted.
    pub fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::from_label(&self.server.mode).unwrap_or(ExecutionMode::Direct)
    }
}

// ============================================================================
// Sections
// ============================================================================

/// External key-value store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Overridden by `REDIS_HOST` / `--redis-host`
    #[serde(default = "default_store_host")]
    pub host: String,

    /// Overridden by `REDIS_PORT` / `--redis-port`
    #[serde(default = "default_store_port")]
    pub port: u16,

    #[serde(default = "default_key_pattern")]
    pub key_pattern: String,

    #[serde(default = "default_result_suffix")]
    pub result_suffix: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_store_host() -> String {
    defaults::STORE_HOST.to_string()
}
fn default_store_port() -> u16 {
    defaults::STORE_PORT
}
fn default_key_pattern() -> String {
    defaults::BATCH_KEY_PATTERN.to_string()
}
fn default_result_suffix() -> String {
    defaults::RESULT_KEY_SUFFIX.to_string()
}
fn default_connect_timeout_secs() -> u64 {
    defaults::STORE_CONNECT_TIMEOUT_SECS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: default_store_host(),
            port: default_store_port(),
            key_pattern: default_key_pattern(),
            result_suffix: default_result_suffix(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl StoreConfig {
    /// Connection URL for the Redis client.
    pub fn url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Batch worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Pool size for parallel mode. Overridden by `CORE_COUNT`.
    #[serde(default = "default_core_count")]
    pub core_count: usize,

    /// Process batches on the pool instead of one at a time. Overridden by `THREADED`.
    #[serde(default)]
    pub threaded: bool,
}

fn default_core_count() -> usize {
    defaults::CORE_COUNT
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            core_count: default_core_count(),
            threaded: false,
        }
    }
}

/// Execution mode and HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Deployment label, see [`ExecutionMode::from_label`]. Overridden by `MODE`.
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Listen address in service mode. Overridden by `HTTP_ADDR` / `--http-addr`.
    #[serde(default = "default_http_addr")]
    pub addr: String,
}

fn default_mode() -> String {
    defaults::EXECUTION_MODE.to_string()
}
fn default_http_addr() -> String {
    defaults::HTTP_ADDR.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            addr: default_http_addr(),
        }
    }
}

/// Analysis tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_spectrum_bins")]
    pub spectrum_bins: usize,
}

fn default_spectrum_bins() -> usize {
    defaults::SPECTRUM_PREFIX_BINS
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            spectrum_bins: default_spectrum_bins(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
