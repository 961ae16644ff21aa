//! Error types for Hearthkey Core.

use thiserror::Error;

/// Errors raised while constructing core values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("{kind} must not be empty")]
    EmptyIdentifier { kind: &'static str },

    #[error("{kind} exceeds {max} bytes (got {len})")]
    IdentifierTooLong {
        kind: &'static str,
        len: usize,
        max: usize,
    },

    #[error("{kind} contains a control character")]
    InvalidCharacter { kind: &'static str },

    #[error("{kind} for {member} must not be empty")]
    EmptyKeyMaterial { kind: &'static str, member: String },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
