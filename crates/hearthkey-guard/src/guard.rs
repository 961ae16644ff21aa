//! The access control guard.
//!
//! Three kinds of rights gate vault operations:
//!
//! - **membership** to read one's own wrapped key,
//! - **ownership** for bulk replacement and revocation,
//! - **proof of current access** for handing the key to another member: the
//!   caller must already hold a wrapped key, which shows it can unwrap the
//!   household key and re-wrap it.
//!
//! Decisions are pure functions of the household view and the vault facts
//! the caller supplies; the guard does no I/O.

use hearthkey_core::{Household, UserId};

use crate::error::{GuardError, Result};

/// A guarded vault operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action<'a> {
    /// Read the caller's own wrapped key.
    ReadOwnKey,

    /// Replace the whole vault with entries for `recipients`.
    ReplaceKeys { recipients: Vec<&'a UserId> },

    /// Hand a wrapped key to `target`.
    GrantKey {
        target: &'a UserId,
        caller_has_key: bool,
    },

    /// Remove a member's wrapped key.
    RevokeKey,

    /// Inspect which members lack or hold stale entries.
    AuditKeys,
}

/// Access decisions for one household.
#[derive(Debug, Clone, Copy)]
pub struct Guard<'h> {
    household: &'h Household,
}

impl<'h> Guard<'h> {
    /// Create a guard over the current membership of `household`.
    pub fn new(household: &'h Household) -> Self {
        Self { household }
    }

    /// The household this guard decides for.
    pub fn household(&self) -> &'h Household {
        self.household
    }

    /// Check that `caller` may perform `action`.
    pub fn authorize(&self, caller: &UserId, action: &Action<'_>) -> Result<()> {
        match action {
            Action::ReadOwnKey => self.require_member(caller),
            Action::ReplaceKeys { recipients } => {
                self.require_owner(caller)?;
                self.require_recipients(recipients.iter().copied())
            }
            Action::GrantKey {
                target,
                caller_has_key,
            } => self.require_grant(caller, target, *caller_has_key),
            Action::RevokeKey | Action::AuditKeys => self.require_owner(caller),
        }
    }

    /// The caller must be a current member.
    pub fn require_member(&self, caller: &UserId) -> Result<()> {
        if self.household.is_member(caller) {
            Ok(())
        } else {
            Err(GuardError::NotMember {
                household: self.household.household_id.clone(),
                user: caller.clone(),
            })
        }
    }

    /// The caller must own the household.
    pub fn require_owner(&self, caller: &UserId) -> Result<()> {
        if self.household.is_owner(caller) {
            Ok(())
        } else {
            Err(GuardError::NotOwner {
                household: self.household.household_id.clone(),
                user: caller.clone(),
            })
        }
    }

    /// Every recipient must be a current member.
    ///
    /// All offending ids are reported, in the order given.
    pub fn require_recipients<'k>(
        &self,
        recipients: impl IntoIterator<Item = &'k UserId>,
    ) -> Result<()> {
        let unknown: Vec<UserId> = recipients
            .into_iter()
            .filter(|user| !self.household.is_member(user))
            .cloned()
            .collect();

        if unknown.is_empty() {
            Ok(())
        } else {
            Err(GuardError::UnknownRecipients {
                household: self.household.household_id.clone(),
                users: unknown,
            })
        }
    }

    /// Capability check for handing the key onward.
    ///
    /// Order matters: a keyless caller is refused before the target is looked
    /// at, so the answer does not reveal whether the target is a member.
    pub fn require_grant(
        &self,
        caller: &UserId,
        target: &UserId,
        caller_has_key: bool,
    ) -> Result<()> {
        self.require_member(caller)?;

        if !caller_has_key {
            return Err(GuardError::NoVaultAccess {
                household: self.household.household_id.clone(),
                user: caller.clone(),
            });
        }

        if !self.household.is_member(target) {
            return Err(GuardError::RecipientNotMember {
                household: self.household.household_id.clone(),
                user: target.clone(),
            });
        }

        Ok(())
    }
}
