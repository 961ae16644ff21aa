//! # Hearthkey Server
//!
//! HTTP API over the [`Hearthkey`] service.
//!
//! Routes live under `/api/keys`; callers are identified by headers set by an
//! upstream verifier (see [`identity`]). `GET /health` needs no identity.
//!
//! ```no_run
//! use hearthkey_server::{app, AppState, ServerConfig};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ServerConfig::default();
//! let state = AppState::new(config.open_service()?);
//! let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
//! axum::serve(listener, app(state, &config)).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod identity;
pub mod routes;

pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
pub use extract::JsonBody;
pub use identity::HeaderIdentity;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use hearthkey::Hearthkey;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Hearthkey,
}

impl AppState {
    pub fn new(service: Hearthkey) -> Self {
        Self { service }
    }
}

/// Build the API router without CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route(
            "/api/keys/user",
            get(routes::get_user_keys).post(routes::setup_user_keys),
        )
        .route("/api/keys/user/status", get(routes::get_key_status))
        .route("/api/keys/user/:user_id/public", get(routes::get_public_key))
        .route(
            "/api/keys/household/:household_id",
            get(routes::get_household_key).post(routes::set_household_keys),
        )
        .route(
            "/api/keys/household/:household_id/member",
            post(routes::add_member_key),
        )
        .route(
            "/api/keys/household/:household_id/member/:member_id",
            delete(routes::remove_member_key),
        )
        .route(
            "/api/keys/household/:household_id/state",
            get(routes::get_access_state),
        )
        .route(
            "/api/keys/household/:household_id/pending",
            get(routes::get_pending_members),
        )
        .route(
            "/api/keys/household/:household_id/stale",
            get(routes::get_stale_entries),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for a fixed list of credentialed origins.
///
/// Origins that are not valid header values are skipped with a warning.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static(identity::USER_ID_HEADER),
            HeaderName::from_static(identity::USER_EMAIL_HEADER),
        ])
        .allow_credentials(true)
}

/// The full application: router plus CORS from `config`.
pub fn app(state: AppState, config: &ServerConfig) -> Router {
    router(state).layer(cors_layer(&config.cors_origins))
}
