//! Strong type definitions for Hearthkey.
//!
//! Identifiers are validated newtypes so a household id can never be passed
//! where a user id is expected. Key material is opaque: the text the client
//! submitted is stored and returned byte for byte.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Maximum length of an identifier, in bytes.
pub const MAX_ID_LEN: usize = 256;

fn validate_id(kind: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(CoreError::EmptyIdentifier { kind });
    }
    if value.len() > MAX_ID_LEN {
        return Err(CoreError::IdentifierTooLong {
            kind,
            len: value.len(),
            max: MAX_ID_LEN,
        });
    }
    if value.chars().any(char::is_control) {
        return Err(CoreError::InvalidCharacter { kind });
    }
    Ok(())
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a validated identifier.
            pub fn new(value: impl Into<String>) -> Result<Self> {
                let value = value.into();
                validate_id($kind, &value)?;
                Ok(Self(value))
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = CoreError;

            fn try_from(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }
    };
}

identifier!(
    /// Stable identifier of a user, as issued by the identity provider.
    UserId,
    "user id"
);

identifier!(
    /// Identifier of a household, as issued by the membership directory.
    HouseholdId,
    "household id"
);

macro_rules! key_material {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap client-supplied encoded key material.
            pub fn new(encoded: impl Into<String>) -> Self {
                Self(encoded.into())
            }

            /// The encoded text exactly as the client supplied it.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the client supplied an empty value.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Length of the encoded text in bytes.
            pub fn len(&self) -> usize {
                self.0.len()
            }

            /// Consume and return the encoded text.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        // Never print key material, only its size.
        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(<{} bytes>)", stringify!($name), self.0.len())
            }
        }

        impl From<String> for $name {
            fn from(encoded: String) -> Self {
                Self(encoded)
            }
        }

        impl From<&str> for $name {
            fn from(encoded: &str) -> Self {
                Self(encoded.to_owned())
            }
        }
    };
}

key_material!(
    /// A user's public key, encoded by the client.
    PublicKey
);

key_material!(
    /// A user's private key, encrypted under a passphrase-derived key.
    EncryptedPrivateKey
);

key_material!(
    /// Salt for the client's passphrase key derivation.
    Salt
);

key_material!(
    /// The household content key wrapped for exactly one member.
    WrappedKey
);

/// The vault of one household: member id to that member's wrapped key.
///
/// Ordered so that serialized maps and log output are deterministic.
pub type WrappedKeyMap = BTreeMap<UserId, WrappedKey>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_rejects_empty() {
        assert_eq!(
            UserId::new(""),
            Err(CoreError::EmptyIdentifier { kind: "user id" })
        );
        assert!(HouseholdId::new("").is_err());
    }

    #[test]
    fn test_identifier_rejects_oversized() {
        let long = "a".repeat(MAX_ID_LEN + 1);
        assert!(matches!(
            HouseholdId::new(long),
            Err(CoreError::IdentifierTooLong { len, .. }) if len == MAX_ID_LEN + 1
        ));
        assert!(HouseholdId::new("a".repeat(MAX_ID_LEN)).is_ok());
    }

    #[test]
    fn test_identifier_rejects_control_chars() {
        assert!(UserId::new("user\n1").is_err());
    }

    #[test]
    fn test_identifier_display_and_debug() {
        let id = UserId::new("u-123").unwrap();
        assert_eq!(id.to_string(), "u-123");
        assert_eq!(format!("{:?}", id), "UserId(u-123)");
    }

    #[test]
    fn test_identifier_deserialize_validates() {
        let ok: UserId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(ok.as_str(), "abc");
        assert!(serde_json::from_str::<UserId>("\"\"").is_err());
    }

    #[test]
    fn test_key_material_debug_is_redacted() {
        let key = WrappedKey::new("c2VjcmV0LWtleS1tYXRlcmlhbA==");
        let debug = format!("{:?}", key);
        assert_eq!(debug, "WrappedKey(<28 bytes>)");
        assert!(!debug.contains("c2Vj"));
    }

    #[test]
    fn test_key_material_is_opaque() {
        // Not valid base64, not valid anything: stored verbatim.
        let key = PublicKey::new("%%not-base64%%");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"%%not-base64%%\"");
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_wrapped_key_map_serializes_as_object() {
        let mut map = WrappedKeyMap::new();
        map.insert(UserId::new("b").unwrap(), WrappedKey::new("wb"));
        map.insert(UserId::new("a").unwrap(), WrappedKey::new("wa"));
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"a":"wa","b":"wb"}"#);
    }

    proptest::proptest! {
        #[test]
        fn prop_valid_identifiers_survive_json(s in "[a-zA-Z0-9_@.-]{1,64}") {
            let id = UserId::new(s.clone()).unwrap();
            let json = serde_json::to_string(&id).unwrap();
            let back: UserId = serde_json::from_str(&json).unwrap();
            proptest::prop_assert_eq!(back.as_str(), s.as_str());
        }
    }
}
