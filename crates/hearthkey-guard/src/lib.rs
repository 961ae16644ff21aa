//! # Hearthkey Guard
//!
//! Per-operation authorization for household key operations.
//!
//! ## Overview
//!
//! Vault access is not a single role check. Reading requires membership,
//! administrative operations require ownership, and extending access to a new
//! member requires *proof of current access*: the caller must itself hold a
//! wrapped key for the household.
//!
//! ## Usage
//!
//! ```rust
//! use hearthkey_core::{Household, HouseholdId, UserId};
//! use hearthkey_guard::{Action, Guard};
//!
//! let owner = UserId::new("owner").unwrap();
//! let household = Household::new(HouseholdId::new("h1").unwrap(), "Home", owner.clone());
//!
//! let guard = Guard::new(&household);
//! assert!(guard.authorize(&owner, &Action::ReadOwnKey).is_ok());
//! ```

pub mod error;
pub mod guard;

pub use error::{GuardError, Result};
pub use guard::{Action, Guard};
