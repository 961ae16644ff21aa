//! Store traits: the abstract interfaces for key and membership persistence.
//!
//! [`KeyStore`] is owned by Hearthkey: user key records and the per-member
//! vault entries. [`MembershipDirectory`] is the external membership store;
//! Hearthkey reads it and only tests or the directory's own owner write it.

use async_trait::async_trait;
use hearthkey_core::{
    Household, HouseholdId, UserId, UserKeyRecord, UserProfile, WrappedKey, WrappedKeyMap,
};

use crate::error::Result;

/// Result of a write-once insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// The record was written.
    Inserted,
    /// A usable record already exists; nothing was written.
    AlreadyExists,
}

/// Persistence for user key records and household vault entries.
///
/// Each vault entry is an independent record keyed by
/// `(household_id, member_id)`, so single-entry writes never overwrite other
/// members' entries.
///
/// # Design Notes
///
/// - **Write-once records**: `insert_user_keys` is atomic. It only replaces a
///   stored record whose public key is empty.
/// - **Independent entries**: `put_member_key` and `delete_member_key` touch
///   exactly one entry.
/// - **Bulk replace**: `replace_member_keys` swaps the whole map of one
///   household in a single atomic step.
#[async_trait]
pub trait KeyStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // User Key Records
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a user's key record.
    async fn get_user_keys(&self, user_id: &UserId) -> Result<Option<UserKeyRecord>>;

    /// Insert a user's key record unless a usable one already exists.
    async fn insert_user_keys(&self, record: &UserKeyRecord) -> Result<InsertResult>;

    // ─────────────────────────────────────────────────────────────────────────
    // Vault Entries
    // ─────────────────────────────────────────────────────────────────────────

    /// Get one member's wrapped key.
    async fn get_member_key(
        &self,
        household_id: &HouseholdId,
        member_id: &UserId,
    ) -> Result<Option<WrappedKey>>;

    /// Read the full vault of a household. Empty if it has none.
    async fn list_member_keys(&self, household_id: &HouseholdId) -> Result<WrappedKeyMap>;

    /// Insert or overwrite one member's wrapped key.
    async fn put_member_key(
        &self,
        household_id: &HouseholdId,
        member_id: &UserId,
        wrapped_key: &WrappedKey,
    ) -> Result<()>;

    /// Delete one member's wrapped key. Returns whether an entry existed.
    async fn delete_member_key(&self, household_id: &HouseholdId, member_id: &UserId)
        -> Result<bool>;

    /// Replace the whole vault of a household with `keys`.
    async fn replace_member_keys(
        &self,
        household_id: &HouseholdId,
        keys: &WrappedKeyMap,
    ) -> Result<()>;
}

/// Extension trait for common key store patterns.
pub trait KeyStoreExt: KeyStore {
    /// Whether a member currently holds a vault entry.
    fn has_member_key(
        &self,
        household_id: &HouseholdId,
        member_id: &UserId,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;
}

impl<S: KeyStore + ?Sized> KeyStoreExt for S {
    async fn has_member_key(&self, household_id: &HouseholdId, member_id: &UserId) -> Result<bool> {
        Ok(self.get_member_key(household_id, member_id).await?.is_some())
    }
}

/// The membership directory: users, households and their member sets.
///
/// Membership changes never touch vault entries, with one exception:
/// deleting a household destroys its vault.
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    /// Look up a user.
    async fn get_user(&self, user_id: &UserId) -> Result<Option<UserProfile>>;

    /// Register a user, or refresh their profile if already known.
    async fn upsert_user(&self, profile: &UserProfile) -> Result<()>;

    /// Look up a household and its members.
    async fn get_household(&self, household_id: &HouseholdId) -> Result<Option<Household>>;

    /// Create a household. Fails with `Conflict` if the id is taken.
    async fn create_household(&self, household: &Household) -> Result<()>;

    /// Add a member. Returns false if they were already a member.
    async fn add_member(&self, household_id: &HouseholdId, user_id: &UserId) -> Result<bool>;

    /// Remove a member. Returns false if they were not a member.
    ///
    /// The member's vault entry, if any, is left in place.
    async fn remove_member(&self, household_id: &HouseholdId, user_id: &UserId) -> Result<bool>;

    /// Delete a household together with its vault.
    async fn delete_household(&self, household_id: &HouseholdId) -> Result<bool>;
}
