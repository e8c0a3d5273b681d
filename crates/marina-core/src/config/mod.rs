//! Configuration parsing and management.
//!
//! Marina configuration is a small TOML document:
//!
//! ```toml
//! [storage]
//! backend = "sqlite"
//! path = "/var/lib/marina/marina.db"
//!
//! [occupancy]
//! conflict_retries = 3
//!
//! [reconciliation]
//! max_concurrency = 8
//!
//! [log]
//! level = "info"
//! ```
//!
//! Every section is optional and falls back to its defaults.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::log::LogConfig;
use crate::storage::{InMemoryGateway, SqliteGateway, StorageError, StorageGateway};

/// Default number of re-reads after a version conflict.
pub const DEFAULT_CONFLICT_RETRIES: u32 = 3;

/// Default number of slips reconciled concurrently.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Configuration errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML is malformed or has the wrong shape.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be rendered as TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The configuration parsed but is not usable.
    #[error("invalid config: {0}")]
    Validation(String),

    /// The configured storage backend could not be opened.
    #[error("failed to open storage: {0}")]
    Storage(#[from] StorageError),
}

/// Top-level marina configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarinaConfig {
    /// Storage backend selection.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Arrival and departure behavior.
    #[serde(default)]
    pub occupancy: OccupancyConfig,

    /// Boat-removal sweep behavior.
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,

    /// Logging.
    #[serde(default)]
    pub log: LogConfig,
}

impl MarinaConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks cross-field constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.backend == StorageBackend::Sqlite && self.storage.path.is_none() {
            return Err(ConfigError::Validation(
                "storage.path is required when storage.backend = \"sqlite\"".to_string(),
            ));
        }
        if self.reconciliation.max_concurrency == 0 {
            return Err(ConfigError::Validation(
                "reconciliation.max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Available storage backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local, lost on exit.
    #[default]
    Memory,
    /// `SQLite` database file.
    Sqlite,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Which backend to use.
    #[serde(default)]
    pub backend: StorageBackend,

    /// Database path for the `sqlite` backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// Opens the configured gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be opened or the `sqlite`
    /// backend has no path.
    pub fn open_gateway(&self) -> Result<Arc<dyn StorageGateway>, ConfigError> {
        match self.backend {
            StorageBackend::Memory => Ok(Arc::new(InMemoryGateway::new())),
            StorageBackend::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Validation("storage.path is required for sqlite".to_string())
                })?;
                Ok(Arc::new(SqliteGateway::open(path)?))
            },
        }
    }
}

/// Arrival and departure configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyConfig {
    /// How many times a conflicting write is re-read and retried.
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,
}

impl Default for OccupancyConfig {
    fn default() -> Self {
        Self {
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }
}

/// Boat-removal sweep configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Upper bound on concurrent slip updates.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

const fn default_conflict_retries() -> u32 {
    DEFAULT_CONFLICT_RETRIES
}

const fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}
