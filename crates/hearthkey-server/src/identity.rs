//! Caller identity from a trusted upstream verifier.
//!
//! Token verification happens in front of this service. The verifier
//! forwards the verified subject in [`USER_ID_HEADER`] and, when known, the
//! email in [`USER_EMAIL_HEADER`]. A caller seen for the first time is
//! registered in the membership directory.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tracing::debug;

use hearthkey_core::{Caller, UserId};

use crate::error::ApiError;
use crate::AppState;

/// Header carrying the verified user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the verified email address.
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct HeaderIdentity(pub Caller);

impl HeaderIdentity {
    pub fn user_id(&self) -> &UserId {
        &self.0.user_id
    }

    /// Read the caller from request headers.
    ///
    /// A missing, non-UTF-8 or invalid user id is unauthenticated. A missing
    /// email is allowed and stored as empty.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let user_id = headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .and_then(|value| UserId::new(value).ok())
            .ok_or(ApiError::Unauthenticated)?;

        let email = headers
            .get(USER_EMAIL_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .trim()
            .to_string();

        Ok(Self(Caller::new(user_id, email)))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for HeaderIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let identity = Self::from_headers(&parts.headers)?;
        state.service.registry().register(&identity.0).await?;
        debug!(user_id = %identity.user_id(), "authenticated request");
        Ok(identity)
    }
}
