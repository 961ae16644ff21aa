//! Error types for access control decisions.

use hearthkey_core::{HouseholdId, UserId};
use thiserror::Error;

/// Why a guarded operation was denied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    /// Caller is not a member of the household.
    #[error("{user} is not a member of household {household}")]
    NotMember { household: HouseholdId, user: UserId },

    /// Caller does not own the household.
    #[error("only the owner of household {household} can manage encryption keys")]
    NotOwner { household: HouseholdId, user: UserId },

    /// Caller holds no wrapped key, so it cannot hand one onward.
    #[error("{user} has no access to the encryption key of household {household}")]
    NoVaultAccess { household: HouseholdId, user: UserId },

    /// Recipient of a wrapped key is not a member of the household.
    #[error("{user} is not a member of household {household}")]
    RecipientNotMember { household: HouseholdId, user: UserId },

    /// A bulk payload names users outside the household.
    #[error("household {household} has no members {users:?}")]
    UnknownRecipients {
        household: HouseholdId,
        users: Vec<UserId>,
    },
}

impl GuardError {
    /// Whether the denial concerns the caller's rights (as opposed to the
    /// validity of the recipients named in the request).
    pub fn is_forbidden(&self) -> bool {
        matches!(
            self,
            GuardError::NotMember { .. }
                | GuardError::NotOwner { .. }
                | GuardError::NoVaultAccess { .. }
        )
    }
}

/// Result type for guard decisions.
pub type Result<T> = std::result::Result<T, GuardError>;
