//! # Hearthkey
//!
//! Household key distribution and membership consistency.
//!
//! ## Overview
//!
//! Members of a household share content only they can decrypt. Each
//! household has one symmetric content key; each member holds a private key
//! that unwraps a per-member copy of it. All cryptography happens on clients:
//! to this crate, key material is opaque text that is stored and returned
//! verbatim.
//!
//! - **Registry**: each user's public key and passphrase-encrypted private key
//! - **Vault**: per household, member id to wrapped household key
//! - **Workflow**: onboarding and revocation reporting over the vault
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hearthkey::{Hearthkey, HearthkeyConfig, KeySetup};
//! use hearthkey::core::{Caller, UserId};
//! use hearthkey::store::MemoryStore;
//!
//! async fn example() {
//!     let service = Hearthkey::with_store(MemoryStore::new(), HearthkeyConfig::default());
//!
//!     let alice = UserId::new("alice").unwrap();
//!     service
//!         .registry()
//!         .register(&Caller::new(alice.clone(), "alice@example.com"))
//!         .await
//!         .unwrap();
//!     service
//!         .registry()
//!         .setup_user_keys(&alice, KeySetup::new("pk", "encrypted-sk", "salt"))
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `hearthkey::core` - identifiers, key material, records
//! - `hearthkey::store` - storage traits, SQLite and in-memory stores
//! - `hearthkey::guard` - access control decisions

pub mod config;
pub mod error;
pub mod registry;
pub mod vault;
pub mod workflow;

use std::sync::Arc;

// Re-export component crates
pub use hearthkey_core as core;
pub use hearthkey_guard as guard;
pub use hearthkey_store as store;

pub use config::{HearthkeyConfig, VaultConfig, WriteMode};
pub use error::{KeyError, Result};
pub use registry::{KeyRegistry, KeySetup, PublicKeyInfo};
pub use vault::{KeyVault, MemberKey};
pub use workflow::{KeyAccessState, KeyWorkflow};

use hearthkey_store::{KeyStore, MembershipDirectory};

/// The assembled service: registry, vault and workflow over shared stores.
#[derive(Clone)]
pub struct Hearthkey {
    registry: KeyRegistry,
    vault: KeyVault,
    workflow: KeyWorkflow,
    directory: Arc<dyn MembershipDirectory>,
}

impl Hearthkey {
    /// Assemble the service from separate key and membership stores.
    pub fn new(
        keys: Arc<dyn KeyStore>,
        directory: Arc<dyn MembershipDirectory>,
        config: HearthkeyConfig,
    ) -> Self {
        Self {
            registry: KeyRegistry::new(keys.clone(), directory.clone()),
            vault: KeyVault::new(keys.clone(), directory.clone(), &config.vault),
            workflow: KeyWorkflow::new(keys, directory.clone()),
            directory,
        }
    }

    /// Assemble the service over one store that holds both keys and membership.
    pub fn with_store<S>(store: S, config: HearthkeyConfig) -> Self
    where
        S: KeyStore + MembershipDirectory + 'static,
    {
        let store = Arc::new(store);
        Self::new(store.clone(), store, config)
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    pub fn vault(&self) -> &KeyVault {
        &self.vault
    }

    pub fn workflow(&self) -> &KeyWorkflow {
        &self.workflow
    }

    /// The membership directory the service reads.
    pub fn directory(&self) -> &Arc<dyn MembershipDirectory> {
        &self.directory
    }
}
