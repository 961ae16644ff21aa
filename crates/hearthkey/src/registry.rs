//! The user key registry.
//!
//! Holds each user's public key together with their own passphrase-encrypted
//! private key, and publishes public keys to other users so they can wrap the
//! household key for them. Records are write-once: resetting keys goes
//! through recovery, not through this registry.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use hearthkey_core::{
    Caller, EncryptedPrivateKey, KeyStatus, PublicKey, Salt, UserId, UserKeyRecord, UserProfile,
    DEFAULT_KEY_VERSION,
};
use hearthkey_store::{InsertResult, KeyStore, MembershipDirectory};

use crate::error::{KeyError, Result};

/// Key material a client submits when setting up encryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySetup {
    pub public_key: PublicKey,
    pub encrypted_private_key: EncryptedPrivateKey,
    pub salt: Salt,
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    DEFAULT_KEY_VERSION
}

impl KeySetup {
    /// Key material at the default format version.
    pub fn new(
        public_key: impl Into<PublicKey>,
        encrypted_private_key: impl Into<EncryptedPrivateKey>,
        salt: impl Into<Salt>,
    ) -> Self {
        Self {
            public_key: public_key.into(),
            encrypted_private_key: encrypted_private_key.into(),
            salt: salt.into(),
            version: DEFAULT_KEY_VERSION,
        }
    }
}

/// A user's published public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyInfo {
    pub user_id: UserId,
    pub public_key: PublicKey,
}

/// Registry of user key records.
#[derive(Clone)]
pub struct KeyRegistry {
    keys: Arc<dyn KeyStore>,
    directory: Arc<dyn MembershipDirectory>,
}

impl KeyRegistry {
    /// Create a registry over the given stores.
    pub fn new(keys: Arc<dyn KeyStore>, directory: Arc<dyn MembershipDirectory>) -> Self {
        Self { keys, directory }
    }

    /// Make sure an authenticated caller is known to the directory.
    ///
    /// Existing profiles are returned untouched.
    pub async fn register(&self, caller: &Caller) -> Result<UserProfile> {
        if let Some(profile) = self.directory.get_user(&caller.user_id).await? {
            return Ok(profile);
        }

        let profile = UserProfile {
            user_id: caller.user_id.clone(),
            email: caller.email.clone(),
            name: String::new(),
        };
        self.directory.upsert_user(&profile).await?;
        info!(user_id = %caller.user_id, "registered user");
        Ok(profile)
    }

    /// Create the caller's key record.
    ///
    /// Fails with `AlreadySetUp` when a record with a public key exists. The
    /// material is stored exactly as submitted.
    pub async fn setup_user_keys(
        &self,
        user_id: &UserId,
        setup: KeySetup,
    ) -> Result<UserKeyRecord> {
        if self.directory.get_user(user_id).await?.is_none() {
            return Err(KeyError::user_not_found(user_id));
        }

        let record = UserKeyRecord {
            user_id: user_id.clone(),
            public_key: setup.public_key,
            encrypted_private_key: setup.encrypted_private_key,
            salt: setup.salt,
            version: setup.version,
        };

        match self.keys.insert_user_keys(&record).await? {
            InsertResult::Inserted => {
                info!(user_id = %user_id, version = record.version, "user keys set up");
                Ok(record)
            }
            InsertResult::AlreadyExists => {
                debug!(user_id = %user_id, "rejected second key setup");
                Err(KeyError::AlreadySetUp(user_id.clone()))
            }
        }
    }

    /// The caller's own full record, including the encrypted private key.
    pub async fn get_own_keys(&self, user_id: &UserId) -> Result<UserKeyRecord> {
        self.keys
            .get_user_keys(user_id)
            .await?
            .filter(UserKeyRecord::has_keys)
            .ok_or_else(|| KeyError::NotSetUp(user_id.clone()))
    }

    /// Whether the user has set up encryption. Missing records are not an error.
    pub async fn get_key_status(&self, user_id: &UserId) -> Result<KeyStatus> {
        let record = self.keys.get_user_keys(user_id).await?;
        Ok(KeyStatus::from_record(record.as_ref()))
    }

    /// Another user's public key.
    pub async fn get_public_key(&self, target: &UserId) -> Result<PublicKeyInfo> {
        if self.directory.get_user(target).await?.is_none() {
            return Err(KeyError::user_not_found(target));
        }

        let record = self
            .keys
            .get_user_keys(target)
            .await?
            .filter(UserKeyRecord::has_keys)
            .ok_or_else(|| KeyError::NoKeys(target.clone()))?;

        Ok(PublicKeyInfo {
            user_id: record.user_id,
            public_key: record.public_key,
        })
    }
}
