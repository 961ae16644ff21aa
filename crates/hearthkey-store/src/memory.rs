//! In-memory implementation of the store traits.
//!
//! This is primarily for testing and single-process deployments. It has the
//! same semantics as SQLite but keeps everything in memory with no
//! persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use hearthkey_core::{
    Household, HouseholdId, UserId, UserKeyRecord, UserProfile, WrappedKey, WrappedKeyMap,
};

use crate::error::{Result, StoreError};
use crate::traits::{InsertResult, KeyStore, MembershipDirectory};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Directory users.
    users: HashMap<UserId, UserProfile>,

    /// Key records indexed by owner.
    user_keys: HashMap<UserId, UserKeyRecord>,

    /// Directory households.
    households: HashMap<HouseholdId, Household>,

    /// Vault entries: household -> member -> wrapped key.
    vault: HashMap<HouseholdId, WrappedKeyMap>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyStore for MemoryStore {
    async fn get_user_keys(&self, user_id: &UserId) -> Result<Option<UserKeyRecord>> {
        let inner = self.read()?;
        Ok(inner.user_keys.get(user_id).cloned())
    }

    async fn insert_user_keys(&self, record: &UserKeyRecord) -> Result<InsertResult> {
        let mut inner = self.write()?;

        if let Some(existing) = inner.user_keys.get(&record.user_id) {
            if existing.has_keys() {
                return Ok(InsertResult::AlreadyExists);
            }
        }

        inner
            .user_keys
            .insert(record.user_id.clone(), record.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_member_key(
        &self,
        household_id: &HouseholdId,
        member_id: &UserId,
    ) -> Result<Option<WrappedKey>> {
        let inner = self.read()?;
        Ok(inner
            .vault
            .get(household_id)
            .and_then(|keys| keys.get(member_id))
            .cloned())
    }

    async fn list_member_keys(&self, household_id: &HouseholdId) -> Result<WrappedKeyMap> {
        let inner = self.read()?;
        Ok(inner.vault.get(household_id).cloned().unwrap_or_default())
    }

    async fn put_member_key(
        &self,
        household_id: &HouseholdId,
        member_id: &UserId,
        wrapped_key: &WrappedKey,
    ) -> Result<()> {
        let mut inner = self.write()?;
        inner
            .vault
            .entry(household_id.clone())
            .or_default()
            .insert(member_id.clone(), wrapped_key.clone());
        Ok(())
    }

    async fn delete_member_key(
        &self,
        household_id: &HouseholdId,
        member_id: &UserId,
    ) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(inner
            .vault
            .get_mut(household_id)
            .map(|keys| keys.remove(member_id).is_some())
            .unwrap_or(false))
    }

    async fn replace_member_keys(
        &self,
        household_id: &HouseholdId,
        keys: &WrappedKeyMap,
    ) -> Result<()> {
        let mut inner = self.write()?;
        inner.vault.insert(household_id.clone(), keys.clone());
        Ok(())
    }
}

#[async_trait]
impl MembershipDirectory for MemoryStore {
    async fn get_user(&self, user_id: &UserId) -> Result<Option<UserProfile>> {
        let inner = self.read()?;
        Ok(inner.users.get(user_id).cloned())
    }

    async fn upsert_user(&self, profile: &UserProfile) -> Result<()> {
        let mut inner = self.write()?;
        inner.users.insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    async fn get_household(&self, household_id: &HouseholdId) -> Result<Option<Household>> {
        let inner = self.read()?;
        Ok(inner.households.get(household_id).cloned())
    }

    async fn create_household(&self, household: &Household) -> Result<()> {
        let mut inner = self.write()?;
        if inner.households.contains_key(&household.household_id) {
            return Err(StoreError::Conflict(format!(
                "household {} already exists",
                household.household_id
            )));
        }
        inner
            .households
            .insert(household.household_id.clone(), household.clone());
        Ok(())
    }

    async fn add_member(&self, household_id: &HouseholdId, user_id: &UserId) -> Result<bool> {
        let mut inner = self.write()?;
        let household = inner
            .households
            .get_mut(household_id)
            .ok_or_else(|| StoreError::NotFound(format!("household {}", household_id)))?;
        Ok(household.add_member(user_id.clone()))
    }

    async fn remove_member(&self, household_id: &HouseholdId, user_id: &UserId) -> Result<bool> {
        let mut inner = self.write()?;
        let household = inner
            .households
            .get_mut(household_id)
            .ok_or_else(|| StoreError::NotFound(format!("household {}", household_id)))?;
        Ok(household.remove_member(user_id))
    }

    async fn delete_household(&self, household_id: &HouseholdId) -> Result<bool> {
        let mut inner = self.write()?;
        inner.vault.remove(household_id);
        Ok(inner.households.remove(household_id).is_some())
    }
}
