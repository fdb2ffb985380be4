//! Configuration System
//!
//! Layered configuration: built-in defaults, an optional TOML file, then
//! `CHECKOUTFS__*` environment variables. Validated before use.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use config::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod merge;
mod sources;

pub use sources::config_file::default_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub lock: LockConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// File server listeners
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    /// Control channel: every action
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bulk channel: read and write only
    #[serde(default = "default_bulk_port")]
    pub bulk_port: u16,
}

/// On-disk locations and persistence cadence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    #[serde(default = "default_blob_dir")]
    pub blob_dir: PathBuf,

    #[serde(default = "default_persist_interval_ms")]
    pub persist_interval_ms: u64,
}

/// Lock service location and session leases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_lock_port")]
    pub port: u16,

    /// Grace period after a session's connection drops
    #[serde(default = "default_lease_ttl_ms")]
    pub lease_ttl_ms: u64,

    #[serde(default = "default_reap_interval_ms")]
    pub reap_interval_ms: u64,

    /// Run the lock service inside `serve`
    #[serde(default = "default_true")]
    pub embedded: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    2050
}

fn default_bulk_port() -> u16 {
    2051
}

fn default_lock_port() -> u16 {
    2181
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("persist/snapshot.json")
}

fn default_blob_dir() -> PathBuf {
    PathBuf::from("storage")
}

fn default_persist_interval_ms() -> u64 {
    1000
}

fn default_lease_ttl_ms() -> u64 {
    10_000
}

fn default_reap_interval_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bulk_port: default_bulk_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            blob_dir: default_blob_dir(),
            persist_interval_ms: default_persist_interval_ms(),
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_lock_port(),
            lease_ttl_ms: default_lease_ttl_ms(),
            reap_interval_ms: default_reap_interval_ms(),
            embedded: default_true(),
        }
    }
}

/// Host names are kept as given and resolved when binding or connecting.
impl ServerConfig {
    pub fn control_addr(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    pub fn bulk_addr(&self) -> (&str, u16) {
        (&self.host, self.bulk_port)
    }
}

impl StorageConfig {
    /// Store rooted at `dir`: snapshot and blobs both live under it.
    pub fn rooted_at(dir: &Path) -> Self {
        Self {
            snapshot_path: dir.join("persist").join("snapshot.json"),
            blob_dir: dir.join("storage"),
            persist_interval_ms: default_persist_interval_ms(),
        }
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_millis(self.persist_interval_ms)
    }
}

impl LockConfig {
    pub fn addr(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_millis(self.lease_ttl_ms)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Server(String),
    Storage(String),
    Lock(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Server(msg) => write!(f, "Server: {}", msg),
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
            ValidationError::Lock(msg) => write!(f, "Lock: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl CheckoutConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.server.host.is_empty() {
            errors.push(ValidationError::Server("Host cannot be empty".to_string()));
        }
        if self.server.port != 0 && self.server.port == self.server.bulk_port {
            errors.push(ValidationError::Server(format!(
                "Control and bulk channels cannot share port {}",
                self.server.port
            )));
        }

        if self.storage.snapshot_path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "Snapshot path cannot be empty".to_string(),
            ));
        }
        if self.storage.blob_dir.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "Blob directory cannot be empty".to_string(),
            ));
        }
        if self.storage.persist_interval_ms == 0 {
            errors.push(ValidationError::Storage(
                "Persist interval must be positive".to_string(),
            ));
        }

        if self.lock.host.is_empty() {
            errors.push(ValidationError::Lock("Host cannot be empty".to_string()));
        }
        if self.lock.lease_ttl_ms == 0 {
            errors.push(ValidationError::Lock("Lease TTL must be positive".to_string()));
        }
        if self.lock.reap_interval_ms == 0 {
            errors.push(ValidationError::Lock(
                "Reap interval must be positive".to_string(),
            ));
        }

        if self.logging.format != "text" && self.logging.format != "json" {
            errors.push(ValidationError::Logging(format!(
                "Invalid format '{}' (must be 'text' or 'json')",
                self.logging.format
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding every problem into one `ConfigError`.
    pub fn ensure_valid(&self) -> Result<(), ApiError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })
    }
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from defaults, the config file and the environment.
    ///
    /// `config_file` must exist when given; otherwise `./checkoutfs.toml` is
    /// used if present.
    pub fn load(config_file: Option<&Path>) -> Result<CheckoutConfig, ConfigError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::config_file::add_to_builder(builder, config_file)?;
        let builder = sources::environment::add_to_builder(builder)?;
        builder.build()?.try_deserialize()
    }

    /// Load configuration from a specific file, without environment overrides.
    pub fn load_from_file(path: &Path) -> Result<CheckoutConfig, ConfigError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::config_file::add_to_builder(builder, Some(path))?;
        builder.build()?.try_deserialize()
    }
}
