//! # Hearthkey Core
//!
//! Pure types for household key distribution: identifiers, opaque key
//! material, user key records and the read-only household view.
//!
//! This crate contains no I/O, no storage and no cryptography. Key material
//! is carried as opaque encoded text produced and consumed by clients; the
//! server side never decodes it.
//!
//! ## Key Types
//!
//! - [`UserId`] / [`HouseholdId`] - Validated opaque identifiers
//! - [`PublicKey`], [`EncryptedPrivateKey`], [`Salt`], [`WrappedKey`] - Opaque key material
//! - [`UserKeyRecord`] - A user's own key material (write-once)
//! - [`WrappedKeyMap`] - The per-household map from member to wrapped key
//! - [`Household`] - Membership view owned by the external directory
//! - [`Caller`] - The authenticated identity of a request

pub mod error;
pub mod household;
pub mod identity;
pub mod record;
pub mod types;

pub use error::{CoreError, Result};
pub use household::{Household, UserProfile};
pub use identity::Caller;
pub use record::{KeyStatus, UserKeyRecord, DEFAULT_KEY_VERSION};
pub use types::{
    EncryptedPrivateKey, HouseholdId, PublicKey, Salt, UserId, WrappedKey, WrappedKeyMap,
    MAX_ID_LEN,
};
