//! User key records.

use serde::{Deserialize, Serialize};

use crate::types::{EncryptedPrivateKey, PublicKey, Salt, UserId};

/// Key format version assumed when the client does not send one.
pub const DEFAULT_KEY_VERSION: u32 = 1;

/// A user's own key material.
///
/// Created once on first encryption setup and never replaced by this
/// subsystem. The private key is only decryptable by the client, using a key
/// derived from the user's passphrase and `salt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserKeyRecord {
    /// The owner of this record.
    pub user_id: UserId,

    /// Public key other members wrap the household key for.
    pub public_key: PublicKey,

    /// The user's private key, encrypted client-side.
    pub encrypted_private_key: EncryptedPrivateKey,

    /// Salt for the passphrase key derivation.
    pub salt: Salt,

    /// Client key format version.
    pub version: u32,
}

impl UserKeyRecord {
    /// Whether this record counts as "encryption set up".
    ///
    /// A record with an empty public key is treated as absent.
    pub fn has_keys(&self) -> bool {
        !self.public_key.is_empty()
    }

    /// The public status view of this record.
    pub fn status(&self) -> KeyStatus {
        KeyStatus::from_record(Some(self))
    }
}

/// Whether a user has encryption set up, and their public key if so.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStatus {
    pub has_encryption_setup: bool,
    pub public_key: Option<PublicKey>,
}

impl KeyStatus {
    /// Status of a user without any usable record.
    pub const fn not_set_up() -> Self {
        Self {
            has_encryption_setup: false,
            public_key: None,
        }
    }

    /// Build the status for an optional stored record.
    pub fn from_record(record: Option<&UserKeyRecord>) -> Self {
        match record {
            Some(r) if r.has_keys() => Self {
                has_encryption_setup: true,
                public_key: Some(r.public_key.clone()),
            },
            _ => Self::not_set_up(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(public_key: &str) -> UserKeyRecord {
        UserKeyRecord {
            user_id: UserId::new("u1").unwrap(),
            public_key: PublicKey::new(public_key),
            encrypted_private_key: EncryptedPrivateKey::new("epk"),
            salt: Salt::new("salt"),
            version: DEFAULT_KEY_VERSION,
        }
    }

    #[test]
    fn test_status_with_keys() {
        let status = record("pk").status();
        assert!(status.has_encryption_setup);
        assert_eq!(status.public_key, Some(PublicKey::new("pk")));
    }

    #[test]
    fn test_empty_public_key_is_not_set_up() {
        let r = record("");
        assert!(!r.has_keys());
        assert_eq!(r.status(), KeyStatus::not_set_up());
    }

    #[test]
    fn test_missing_record_is_not_set_up() {
        assert_eq!(KeyStatus::from_record(None), KeyStatus::not_set_up());
    }
}
