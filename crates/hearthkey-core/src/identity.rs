//! Authenticated caller identity.

use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// The identity of an authenticated request.
///
/// Produced by the external identity verifier; Hearthkey never checks tokens
/// itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: UserId,
    pub email: String,
}

impl Caller {
    pub fn new(user_id: UserId, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
        }
    }
}
