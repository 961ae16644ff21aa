//! Server configuration.
//!
//! Loaded from a TOML file when one exists; every field has a default so an
//! empty or missing file gives a working local setup.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use hearthkey::store::{MemoryStore, SqliteStore, StoreError};
use hearthkey::{Hearthkey, HearthkeyConfig, VaultConfig};

/// Database value selecting the in-memory store.
pub const MEMORY_DATABASE: &str = "memory";

/// Errors raised while loading configuration or opening storage.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to open database: {0}")]
    Store(#[from] StoreError),
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    pub listen_addr: SocketAddr,

    /// `memory`, or the path of a SQLite database file.
    pub database: String,

    /// Origins allowed to make credentialed cross-origin requests.
    pub cors_origins: Vec<String>,

    pub vault: VaultConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            database: MEMORY_DATABASE.to_string(),
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            vault: VaultConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from `path`, or defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Add an extra allowed origin, such as a deployed frontend URL.
    pub fn allow_origin(&mut self, origin: impl Into<String>) {
        let origin = origin.into();
        if !self.cors_origins.contains(&origin) {
            self.cors_origins.push(origin);
        }
    }

    /// Open the configured store and assemble the service over it.
    pub fn open_service(&self) -> Result<Hearthkey, ConfigError> {
        let config = HearthkeyConfig {
            vault: self.vault.clone(),
        };

        if self.database == MEMORY_DATABASE {
            info!("using in-memory store");
            return Ok(Hearthkey::with_store(MemoryStore::new(), config));
        }

        info!(database = %self.database, "opening sqlite store");
        let store = SqliteStore::open(&self.database)?;
        Ok(Hearthkey::with_store(store, config))
    }
}
