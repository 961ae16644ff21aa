//! The household key vault.
//!
//! Per household, a mapping from member id to that member's copy of the
//! household content key, wrapped under the member's public key. The vault
//! reads the membership directory to validate ids and never changes it.
//!
//! Entries shadow membership loosely: a current member may have no entry yet,
//! and a member who left keeps their entry until the owner revokes it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use hearthkey_core::{CoreError, Household, HouseholdId, UserId, WrappedKey, WrappedKeyMap};
use hearthkey_guard::{Action, Guard};
use hearthkey_store::{KeyStore, KeyStoreExt, MembershipDirectory};

use crate::config::{VaultConfig, WriteMode};
use crate::error::{KeyError, Result};

/// The caller's view of their own vault entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberKey {
    pub household_id: HouseholdId,
    pub wrapped_key: Option<WrappedKey>,
    pub has_key: bool,
}

/// Vault of wrapped household keys.
#[derive(Clone)]
pub struct KeyVault {
    keys: Arc<dyn KeyStore>,
    directory: Arc<dyn MembershipDirectory>,
    write_mode: WriteMode,
}

impl KeyVault {
    /// Create a vault over the given stores.
    pub fn new(
        keys: Arc<dyn KeyStore>,
        directory: Arc<dyn MembershipDirectory>,
        config: &VaultConfig,
    ) -> Self {
        Self {
            keys,
            directory,
            write_mode: config.write_mode,
        }
    }

    /// How single-member changes are written.
    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    async fn household(&self, household_id: &HouseholdId) -> Result<Household> {
        self.directory
            .get_household(household_id)
            .await?
            .ok_or_else(|| KeyError::household_not_found(household_id))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// The caller's own wrapped key.
    ///
    /// A member without an entry gets `has_key = false`, not an error. An
    /// empty stored entry counts as no entry.
    pub async fn get_member_key(
        &self,
        household_id: &HouseholdId,
        caller: &UserId,
    ) -> Result<MemberKey> {
        let household = self.household(household_id).await?;
        Guard::new(&household).authorize(caller, &Action::ReadOwnKey)?;

        let wrapped_key = self
            .keys
            .get_member_key(household_id, caller)
            .await?
            .filter(|wrapped| !wrapped.is_empty());
        Ok(MemberKey {
            household_id: household_id.clone(),
            has_key: wrapped_key.is_some(),
            wrapped_key,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the household's whole map. Owner only.
    ///
    /// Every id must be a current member and every wrapped key non-empty;
    /// entries missing from `keys` are dropped. Used when the owner first creates the household key or
    /// rotates it.
    pub async fn set_all_keys(
        &self,
        household_id: &HouseholdId,
        caller: &UserId,
        keys: WrappedKeyMap,
    ) -> Result<()> {
        let household = self.household(household_id).await?;
        Guard::new(&household).authorize(
            caller,
            &Action::ReplaceKeys {
                recipients: keys.keys().collect(),
            },
        )?;
        for (member, wrapped) in &keys {
            require_key_material(member, wrapped)?;
        }

        self.keys.replace_member_keys(household_id, &keys).await?;
        info!(
            household_id = %household_id,
            user_id = %caller,
            count = keys.len(),
            "household keys replaced"
        );
        Ok(())
    }

    /// Hand the household key to `target`.
    ///
    /// The caller must be a member who already holds an entry; that entry is
    /// the proof they could unwrap the key they are now re-wrapping. The
    /// target must be a current member, and the wrapped key must not be
    /// empty. An existing entry for the target is overwritten.
    pub async fn add_member_key(
        &self,
        household_id: &HouseholdId,
        caller: &UserId,
        target: &UserId,
        wrapped_key: WrappedKey,
    ) -> Result<()> {
        let household = self.household(household_id).await?;
        let guard = Guard::new(&household);
        guard.require_member(caller)?;

        match self.write_mode {
            WriteMode::Record => {
                let caller_has_key = self.keys.has_member_key(household_id, caller).await?;
                guard.authorize(
                    caller,
                    &Action::GrantKey {
                        target,
                        caller_has_key,
                    },
                )?;
                require_key_material(target, &wrapped_key)?;
                self.keys
                    .put_member_key(household_id, target, &wrapped_key)
                    .await?;
            }
            WriteMode::Snapshot => {
                let mut map = self.keys.list_member_keys(household_id).await?;
                guard.authorize(
                    caller,
                    &Action::GrantKey {
                        target,
                        caller_has_key: map.contains_key(caller),
                    },
                )?;
                require_key_material(target, &wrapped_key)?;
                map.insert(target.clone(), wrapped_key);
                self.keys.replace_member_keys(household_id, &map).await?;
            }
        }

        info!(
            household_id = %household_id,
            user_id = %caller,
            target = %target,
            "member key added"
        );
        Ok(())
    }

    /// Revoke a member's entry. Owner only.
    ///
    /// Idempotent, and `member_id` need not be a current member: removing the
    /// stale entry of someone who left is the main use. Returns whether an
    /// entry was removed.
    pub async fn remove_member_key(
        &self,
        household_id: &HouseholdId,
        caller: &UserId,
        member_id: &UserId,
    ) -> Result<bool> {
        let household = self.household(household_id).await?;
        Guard::new(&household).authorize(caller, &Action::RevokeKey)?;

        let removed = match self.write_mode {
            WriteMode::Record => self.keys.delete_member_key(household_id, member_id).await?,
            WriteMode::Snapshot => {
                let mut map = self.keys.list_member_keys(household_id).await?;
                let removed = map.remove(member_id).is_some();
                if removed {
                    self.keys.replace_member_keys(household_id, &map).await?;
                }
                removed
            }
        };

        if removed {
            info!(household_id = %household_id, member = %member_id, "member key removed");
        } else {
            debug!(household_id = %household_id, member = %member_id, "no member key to remove");
        }
        Ok(removed)
    }
}

fn require_key_material(member: &UserId, wrapped: &WrappedKey) -> Result<()> {
    if wrapped.is_empty() {
        return Err(CoreError::EmptyKeyMaterial {
            kind: "wrapped key",
            member: member.to_string(),
        }
        .into());
    }
    Ok(())
}
