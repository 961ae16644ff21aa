//! # Hearthkey Store
//!
//! Storage abstraction for Hearthkey. Provides trait-based interfaces for key
//! persistence and for the membership directory, with SQLite and in-memory
//! implementations.
//!
//! ## Key Types
//!
//! - [`KeyStore`] - User key records and per-member vault entries
//! - [`MembershipDirectory`] - Users, households and member sets
//! - [`SqliteStore`] - SQLite-based persistent storage (implements both)
//! - [`MemoryStore`] - In-memory storage for tests (implements both)
//! - [`InsertResult`] - Result of a write-once insert
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hearthkey_core::{HouseholdId, UserId, WrappedKey};
//! use hearthkey_store::{KeyStore, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("hearthkey.db").unwrap();
//!
//!     let household = HouseholdId::new("h1").unwrap();
//!     let member = UserId::new("u1").unwrap();
//!     store
//!         .put_member_key(&household, &member, &WrappedKey::new("wrapped"))
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Write-once key records**: a second insert returns `AlreadyExists`
//! - **Independent vault entries**: one row per (household, member)
//! - **Explicit handles**: stores are constructed by the caller and injected,
//!   there is no process-wide connection

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{InsertResult, KeyStore, KeyStoreExt, MembershipDirectory};

/// Get current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
