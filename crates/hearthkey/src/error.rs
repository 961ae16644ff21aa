//! Error types for key operations.

use hearthkey_core::{CoreError, HouseholdId, UserId};
use hearthkey_guard::GuardError;
use hearthkey_store::StoreError;
use thiserror::Error;

/// Errors returned by the registry, the vault and workflow queries.
///
/// Every failure carries a specific kind. A missing vault entry is not an
/// error: reads report it as `has_key = false`.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The user or household does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The caller has no key record of their own.
    #[error("encryption not set up for {0}")]
    NotSetUp(UserId),

    /// The requested user has no key record.
    #[error("user {0} has not set up encryption")]
    NoKeys(UserId),

    /// A key record already exists and records are write-once.
    #[error("encryption already set up for {0}, use recovery to reset")]
    AlreadySetUp(UserId),

    /// The caller lacks the right this operation requires.
    #[error("forbidden: {0}")]
    Forbidden(#[source] GuardError),

    /// A named recipient is not a current member.
    #[error("invalid member: {0}")]
    InvalidMember(#[source] GuardError),

    /// A malformed identifier or request.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] CoreError),

    /// A backing store failed.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(#[from] StoreError),
}

impl KeyError {
    pub(crate) fn user_not_found(user_id: &UserId) -> Self {
        KeyError::NotFound(format!("user {user_id} not found"))
    }

    pub(crate) fn household_not_found(household_id: &HouseholdId) -> Self {
        KeyError::NotFound(format!("household {household_id} not found"))
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            KeyError::NotFound(_) => "not_found",
            KeyError::NotSetUp(_) => "not_set_up",
            KeyError::NoKeys(_) => "no_keys",
            KeyError::AlreadySetUp(_) => "already_set_up",
            KeyError::Forbidden(_) => "forbidden",
            KeyError::InvalidMember(_) => "invalid_member",
            KeyError::InvalidRequest(_) => "invalid_request",
            KeyError::ServiceUnavailable(_) => "service_unavailable",
        }
    }
}

impl From<GuardError> for KeyError {
    fn from(err: GuardError) -> Self {
        if err.is_forbidden() {
            KeyError::Forbidden(err)
        } else {
            KeyError::InvalidMember(err)
        }
    }
}

/// Result type for key operations.
pub type Result<T> = std::result::Result<T, KeyError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (HouseholdId, UserId) {
        (HouseholdId::new("h1").unwrap(), UserId::new("u1").unwrap())
    }

    #[test]
    fn test_guard_denials_map_to_forbidden() {
        let (household, user) = ids();
        let err: KeyError = GuardError::NoVaultAccess { household, user }.into();
        assert!(matches!(err, KeyError::Forbidden(_)));
        assert_eq!(err.kind(), "forbidden");
    }

    #[test]
    fn test_recipient_errors_map_to_invalid_member() {
        let (household, user) = ids();
        let err: KeyError = GuardError::RecipientNotMember { household, user }.into();
        assert!(matches!(err, KeyError::InvalidMember(_)));
    }

    #[test]
    fn test_store_errors_are_service_unavailable() {
        let err: KeyError = StoreError::Unavailable("down".into()).into();
        assert_eq!(err.kind(), "service_unavailable");
    }
}
