//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use hearthkey::KeyError;
use hearthkey_core::CoreError;

/// Errors returned by handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No usable caller identity on the request.
    #[error("not authenticated")]
    Unauthenticated,

    /// The request body is not the JSON the route expects.
    #[error("invalid request: {0}")]
    MalformedBody(String),

    #[error(transparent)]
    Key(#[from] KeyError),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Key(KeyError::InvalidRequest(err))
    }
}

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ApiError::Key(err) => match err {
                KeyError::NotFound(_) | KeyError::NotSetUp(_) | KeyError::NoKeys(_) => {
                    StatusCode::NOT_FOUND
                }
                KeyError::AlreadySetUp(_)
                | KeyError::InvalidMember(_)
                | KeyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                KeyError::Forbidden(_) => StatusCode::FORBIDDEN,
                KeyError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "unauthenticated",
            ApiError::MalformedBody(_) => "invalid_request",
            ApiError::Key(err) => err.kind(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "request failed");
        } else {
            debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        let body = ErrorBody {
            error: self.kind(),
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
