//! Key distribution workflow reporting.
//!
//! Onboarding and revocation are client-driven: an already-keyed member
//! fetches a newcomer's public key, wraps the household key for them and
//! submits it through [`KeyVault::add_member_key`](crate::KeyVault::add_member_key);
//! the owner revokes departed members with
//! [`KeyVault::remove_member_key`](crate::KeyVault::remove_member_key).
//!
//! Membership and key access are kept apart. Joining a household does not
//! create an entry and leaving does not remove one. These queries report the
//! divergence so clients can prompt the right person; nothing here fixes it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use hearthkey_core::{HouseholdId, UserId};
use hearthkey_guard::{Action, Guard};
use hearthkey_store::{KeyStore, MembershipDirectory};

use crate::error::{KeyError, Result};

/// Where a user stands in a household's key distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAccessState {
    /// Not a member and no entry.
    NotMember,
    /// A member waiting for someone keyed to wrap the key for them.
    MemberNoKey,
    /// A member holding an entry.
    MemberKeyed,
    /// Left the household but still holds an entry the owner has not revoked.
    FormerMemberKeyed,
}

impl KeyAccessState {
    /// Classify from the two independent facts.
    pub fn from_facts(is_member: bool, has_key: bool) -> Self {
        match (is_member, has_key) {
            (false, false) => KeyAccessState::NotMember,
            (true, false) => KeyAccessState::MemberNoKey,
            (true, true) => KeyAccessState::MemberKeyed,
            (false, true) => KeyAccessState::FormerMemberKeyed,
        }
    }

    /// Whether the user can currently decrypt household content.
    pub fn has_key(&self) -> bool {
        matches!(
            self,
            KeyAccessState::MemberKeyed | KeyAccessState::FormerMemberKeyed
        )
    }
}

/// Read-only queries over membership and vault entries.
#[derive(Clone)]
pub struct KeyWorkflow {
    keys: Arc<dyn KeyStore>,
    directory: Arc<dyn MembershipDirectory>,
}

impl KeyWorkflow {
    /// Create a workflow view over the given stores.
    pub fn new(keys: Arc<dyn KeyStore>, directory: Arc<dyn MembershipDirectory>) -> Self {
        Self { keys, directory }
    }

    /// State of one user in one household.
    pub async fn key_access_state(
        &self,
        household_id: &HouseholdId,
        user_id: &UserId,
    ) -> Result<KeyAccessState> {
        let household = self
            .directory
            .get_household(household_id)
            .await?
            .ok_or_else(|| KeyError::household_not_found(household_id))?;
        let has_key = self.keys.get_member_key(household_id, user_id).await?.is_some();
        Ok(KeyAccessState::from_facts(
            household.is_member(user_id),
            has_key,
        ))
    }

    /// Members still waiting for a wrapped key, in membership order.
    ///
    /// Any member may ask: keyed members use it to find who to onboard.
    pub async fn pending_members(
        &self,
        household_id: &HouseholdId,
        caller: &UserId,
    ) -> Result<Vec<UserId>> {
        let household = self
            .directory
            .get_household(household_id)
            .await?
            .ok_or_else(|| KeyError::household_not_found(household_id))?;
        Guard::new(&household).require_member(caller)?;

        let entries = self.keys.list_member_keys(household_id).await?;
        Ok(household
            .members
            .into_iter()
            .filter(|member| !entries.contains_key(member))
            .collect())
    }

    /// Entries held by users who are no longer members. Owner only.
    pub async fn stale_entries(
        &self,
        household_id: &HouseholdId,
        caller: &UserId,
    ) -> Result<Vec<UserId>> {
        let household = self
            .directory
            .get_household(household_id)
            .await?
            .ok_or_else(|| KeyError::household_not_found(household_id))?;
        Guard::new(&household).authorize(caller, &Action::AuditKeys)?;

        let entries = self.keys.list_member_keys(household_id).await?;
        Ok(entries
            .into_keys()
            .filter(|holder| !household.is_member(holder))
            .collect())
    }
}
