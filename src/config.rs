//! Pipeline configuration.
//!
//! `PipelineConfig` is loaded once (TOML) or built in code, validated, and
//! then passed by reference to whatever constructs the pipeline. Backends
//! are chosen here and never switched afterwards.
//!
//! Durations use humantime strings (`"30s"`, `"500ms"`, `"2m"`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_AMOUNT_BUCKET: u64 = 1000;
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_IPFS_API_URL: &str = "http://127.0.0.1:5001";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid duration '{0}': {1}")]
    Duration(String, humantime::DurationError),
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub anonymizer: AnonymizerConfig,

    #[serde(default)]
    pub digest: DigestConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    /// In-process store; results are flagged ephemeral
    #[default]
    Memory,
    Filesystem,
    Ipfs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory for the filesystem backend
    pub path: Option<PathBuf>,

    /// IPFS RPC API base URL
    pub api_url: Option<String>,

    #[serde(default = "default_request_timeout", with = "humantime_duration")]
    pub request_timeout: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: None,
            api_url: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LedgerBackend {
    /// In-process mock ledger
    #[default]
    Memory,
    JsonRpc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub backend: LedgerBackend,

    /// JSON-RPC endpoint URL
    pub endpoint: Option<String>,

    /// How long `submit` waits for finality before `ConfirmationTimeout`
    #[serde(default = "default_confirmation_timeout", with = "humantime_duration")]
    pub confirmation_timeout: Duration,

    /// Initial interval between confirmation polls
    #[serde(default = "default_poll_interval", with = "humantime_duration")]
    pub poll_interval: Duration,

    #[serde(default = "default_request_timeout", with = "humantime_duration")]
    pub request_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::default(),
            endpoint: None,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymizerConfig {
    #[serde(default = "default_amount_bucket")]
    pub amount_bucket: u64,

    /// Secret mixed into subject hashes (keyed hash instead of plain SHA-256)
    pub subject_pepper: Option<String>,
}

impl Default for AnonymizerConfig {
    fn default() -> Self {
        Self {
            amount_bucket: DEFAULT_AMOUNT_BUCKET,
            subject_pepper: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DigestMode {
    #[default]
    Flat,
    Merkle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestConfig {
    #[serde(default)]
    pub mode: DigestMode,

    /// Leaf size for the Merkle digest
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            mode: DigestMode::default(),
            chunk_size: crate::crypto::digest::DEFAULT_MERKLE_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_amount_bucket() -> u64 {
    DEFAULT_AMOUNT_BUCKET
}

fn default_chunk_size() -> usize {
    crate::crypto::digest::DEFAULT_MERKLE_CHUNK_SIZE
}

fn default_confirmation_timeout() -> Duration {
    DEFAULT_CONFIRMATION_TIMEOUT
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

/// Parse a humantime duration string (`"30s"`, `"1m 30s"`).
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(s.trim()).map_err(|e| ConfigError::Duration(s.to_string(), e))
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
    }
}

impl PipelineConfig {
    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: PipelineConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        write_creating_parent(path, &contents)
    }

    /// Check cross-field requirements the types cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.storage.backend {
            StorageBackend::Filesystem if self.storage.path.is_none() => {
                return Err(ConfigError::Invalid(
                    "storage.path is required for the filesystem backend".to_string(),
                ))
            }
            StorageBackend::Ipfs if self.storage.api_url.as_deref().map_or(true, str::is_empty) => {
                return Err(ConfigError::Invalid(
                    "storage.api_url is required for the ipfs backend".to_string(),
                ))
            }
            _ => {}
        }

        if self.ledger.backend == LedgerBackend::JsonRpc
            && self.ledger.endpoint.as_deref().map_or(true, str::is_empty)
        {
            return Err(ConfigError::Invalid(
                "ledger.endpoint is required for the json-rpc backend".to_string(),
            ));
        }

        if self.ledger.poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "ledger.poll_interval must be greater than zero".to_string(),
            ));
        }

        if self.anonymizer.amount_bucket == 0 {
            return Err(ConfigError::Invalid(
                "anonymizer.amount_bucket must be greater than zero".to_string(),
            ));
        }

        if self.anonymizer.subject_pepper.as_deref() == Some("") {
            return Err(ConfigError::Invalid(
                "anonymizer.subject_pepper must not be empty when set".to_string(),
            ));
        }

        if self.digest.mode == DigestMode::Merkle && self.digest.chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "digest.chunk_size must be greater than zero".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "logging.level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml(blob_path: &Path) -> String {
        format!(
            r#"# Shroud contribution pipeline configuration
#
# Records are anonymized and encrypted locally. Only ciphertext reaches the
# blob store, and only its content reference and integrity digest reach
# the ledger.

[storage]
# Blob store: "filesystem", "ipfs", or "memory"
# The memory backend keeps nothing after exit; its results are flagged ephemeral.
backend = "filesystem"
path = "{blob_path}"

# IPFS RPC API (backend = "ipfs")
# api_url = "{ipfs}"

request_timeout = "30s"

[ledger]
# Ledger: "json-rpc" or "memory" (in-process mock, for trials)
backend = "memory"
# endpoint = "http://127.0.0.1:8545"

# How long submit waits for finality. On timeout, poll again with the
# confirmation id (`shroud confirm`); never resubmit.
confirmation_timeout = "2m"
poll_interval = "500ms"
request_timeout = "30s"

[anonymizer]
# Amounts are rounded to the nearest multiple of this bucket
amount_bucket = {bucket}

# Optional secret for keyed subject hashing
# subject_pepper = "..."

[digest]
# "flat" (single SHA-256) or "merkle" (binary tree over chunks)
mode = "flat"
chunk_size = {chunk}

[logging]
# Log level: trace, debug, info, warn, error
level = "info"
"#,
            blob_path = blob_path.display(),
            ipfs = DEFAULT_IPFS_API_URL,
            bucket = DEFAULT_AMOUNT_BUCKET,
            chunk = crate::crypto::digest::DEFAULT_MERKLE_CHUNK_SIZE,
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(config_path: &Path, blob_path: &Path) -> Result<(), ConfigError> {
        write_creating_parent(config_path, &Self::generate_default_toml(blob_path))
    }
}

fn write_creating_parent(path: &Path, contents: &str) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, contents).map_err(io_err)
}

/// Default config file path: `<config dir>/shroud/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shroud")
        .join("config.toml")
}

/// Default root for the filesystem blob store: `<data dir>/shroud/blobs`
pub fn default_blob_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shroud")
        .join("blobs")
}
