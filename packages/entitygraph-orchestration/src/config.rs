//! Service configuration (YAML)
//!
//! ```yaml
//! version: 1
//! storage:
//!   backend: sqlite
//!   database_path: ./entitygraph.db
//!   referenced_content: false
//!   public_base_url: http://localhost:8080
//! ingest:
//!   poll_interval_ms: 1000
//!   initial_delay_ms: 5000
//! logging:
//!   filter: info
//! ```

use entitygraph_storage::{EntityStore, InMemoryBackend, RepositoryBackend, StoreConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const SUPPORTED_VERSIONS: &[u32] = &[1];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing 'version' field in configuration file. Add 'version: 1' to the top of your YAML file.")]
    MissingVersion,

    #[error("Unsupported configuration version {found}. Supported versions: {}", supported.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "))]
    UnsupportedVersion { found: u32, supported: Vec<u32> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSettings {
    pub backend: BackendKind,
    pub database_path: PathBuf,
    pub referenced_content: bool,
    pub public_base_url: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        let store = StoreConfig::default();
        Self {
            backend: BackendKind::default(),
            database_path: PathBuf::from("entitygraph.db"),
            referenced_content: store.referenced_content,
            public_base_url: store.public_base_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestSettings {
    pub poll_interval_ms: u64,
    /// Delay before the first drain after startup
    pub initial_delay_ms: u64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            initial_delay_ms: 5000,
        }
    }
}

impl IngestSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// `EnvFilter` directive; `RUST_LOG` wins when set
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub version: u32,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub ingest: IngestSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Wire form; `version` stays optional so a missing field gets its own error
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ServiceConfigV1 {
    version: Option<u32>,
    #[serde(default)]
    storage: StorageSettings,
    #[serde(default)]
    ingest: IngestSettings,
    #[serde(default)]
    logging: LoggingSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            version: 1,
            storage: StorageSettings::default(),
            ingest: IngestSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl ServiceConfig {
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let raw: ServiceConfigV1 = serde_yaml::from_str(content)?;
        let version = raw.version.ok_or(ConfigError::MissingVersion)?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let config = Self {
            version,
            storage: raw.storage,
            ingest: raw.ingest,
            logging: raw.logging,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.ingest.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "ingest.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.storage.public_base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "storage.public_base_url must not be empty".to_string(),
            ));
        }
        if self.storage.backend == BackendKind::Sqlite {
            if self.storage.database_path.as_os_str().is_empty() {
                return Err(ConfigError::Validation(
                    "storage.database_path is required for the sqlite backend".to_string(),
                ));
            }
            if !cfg!(feature = "sqlite") {
                return Err(ConfigError::Validation(
                    "sqlite backend requested but the 'sqlite' feature is disabled".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            referenced_content: self.storage.referenced_content,
            public_base_url: self.storage.public_base_url.clone(),
        }
    }

    /// Open the configured backend and wrap it in an entity store
    pub fn open_store(&self) -> crate::error::Result<EntityStore> {
        let backend: Arc<dyn RepositoryBackend> = match self.storage.backend {
            BackendKind::Memory => Arc::new(InMemoryBackend::new()),
            #[cfg(feature = "sqlite")]
            BackendKind::Sqlite => Arc::new(entitygraph_storage::SqliteBackend::new(
                &self.storage.database_path,
            )?),
            #[cfg(not(feature = "sqlite"))]
            BackendKind::Sqlite => {
                return Err(ConfigError::Validation(
                    "sqlite backend requested but the 'sqlite' feature is disabled".to_string(),
                )
                .into())
            }
        };
        Ok(EntityStore::new(backend, self.store_config()))
    }
}
