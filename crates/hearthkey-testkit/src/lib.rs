//! # Hearthkey Testkit
//!
//! Testing utilities for Hearthkey.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Client simulation**: real key pairs, wrapping and unwrapping, so tests
//!   can check that what the vault returns is usable by the right member
//! - **Fixtures**: a household with a keyed owner, plus join/onboard/leave
//! - **Harnesses**: a gated store for deterministic races and a store that
//!   fails on demand
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use hearthkey::WriteMode;
//! use hearthkey_testkit::HouseholdFixture;
//!
//! async fn example() {
//!     let fixture = HouseholdFixture::new(WriteMode::Record).await;
//!     let alice = fixture.join("alice").await;
//!     fixture.onboard(&fixture.owner, &alice).await.unwrap();
//! }
//! ```

pub mod client;
pub mod fixtures;
pub mod generators;
pub mod harness;

pub use client::{ClientError, ClientKeys, HouseholdKey};
pub use fixtures::{household, setup_member, user, HouseholdFixture, Member, TEST_PASSPHRASE};
pub use generators::MembershipParams;
pub use harness::{FailingStore, GatedStore, HeldRead};
