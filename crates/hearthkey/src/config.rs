//! Service configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`Hearthkey`](crate::Hearthkey) service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HearthkeyConfig {
    /// Vault behavior.
    pub vault: VaultConfig,
}

/// Configuration for the key vault.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// How single-member changes are written.
    pub write_mode: WriteMode,
}

/// How the vault applies single-member changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Each member's entry is written on its own. Concurrent adds and
    /// removes never overwrite each other.
    #[default]
    Record,

    /// Legacy whole-map layout: read the household's map, change it, write
    /// the full map back. Concurrent writers starting from the same map lose
    /// all but the last write.
    Snapshot,
}
