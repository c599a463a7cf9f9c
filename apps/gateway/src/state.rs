// App state and shared helpers
//
// This module defines:
// - Config: everything read from the environment at startup.
// - AppState: the shared services handlers need (storage, bus, presence, rate
//   limiting, token issuer, bus address). Stored in Arc<> so it's cheap to clone
//   into every handler via `State(AppState)`.
// - Token extraction used by the bearer-auth extractor and the WS handshake.

use anyhow::{Context, Result};
use axum::http::HeaderMap;
use std::sync::Arc;

use bus::pubsub::Publisher;
use presence::PresenceRegistry;
use rate::RateLimiter;
use storage::Storage;
use tokens::TokenIssuer;

/// Everything the hub reads from the environment at startup. See §6.6 of the design
/// for the full table; `SESSION_SECRET` and the LiveKit credentials have no dev
/// default on purpose (auth::create_jwt/verify_jwt already fail fast on a missing
/// SESSION_SECRET).
pub struct Config {
    pub bus_addr: String,
    pub db_path: String,
    pub bind_addr: String,
    pub livekit_server_url: String,
    pub livekit_api_key: String,
    pub livekit_api_secret: String,
    pub deploy_domain: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bus_addr: std::env::var("HUB_BUS_ADDR").unwrap_or_else(|_| "tcp://127.0.0.1:7777".into()),
            db_path: std::env::var("HUB_DB_PATH").unwrap_or_else(|_| "./data".into()),
            bind_addr: std::env::var("HUB_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            livekit_server_url: std::env::var("LIVEKIT_SERVER_URL")
                .unwrap_or_else(|_| "wss://localhost:7880".into()),
            livekit_api_key: std::env::var("LIVEKIT_API_KEY").context("LIVEKIT_API_KEY must be set")?,
            livekit_api_secret: std::env::var("LIVEKIT_API_SECRET")
                .context("LIVEKIT_API_SECRET must be set")?,
            deploy_domain: std::env::var("HUB_DEPLOY_DOMAIN").unwrap_or_else(|_| "localhost".into()),
        })
    }
}

/// Shared app state cloned into request handlers via `State(AppState)`.
#[derive(Clone)]
pub struct AppState {
    pub publisher: Arc<Publisher>,
    pub storage: Arc<Storage>,
    pub presence: PresenceRegistry,
    pub rate: Arc<RateLimiter>,
    pub issuer: Arc<TokenIssuer>,
    pub bus_addr: String,
    pub livekit_server_url: String,
}

fn header_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|hv| hv.to_str().ok())
        .and_then(|s| {
            let s_trim = s.trim();
            if s_trim.len() > 7 && s_trim[..7].eq_ignore_ascii_case("bearer ") {
                Some(s_trim[7..].to_string())
            } else {
                None
            }
        })
}

/// Token lookup used by both the HTTP bearer-auth extractor and the WS handshake
/// (which also accepts a `token` query parameter — see routes::websocket).
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    header_bearer_token(headers)
}

/// Resolve the bearer-authenticated caller for a handler, or the `(status, message)`
/// to return instead.
pub fn require_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<domain::User, (axum::http::StatusCode, String)> {
    use axum::http::StatusCode;

    let token = extract_token(headers)
        .ok_or((StatusCode::UNAUTHORIZED, "missing bearer token".to_string()))?;
    let claims = auth::verify_jwt(&token)
        .map_err(|_| (StatusCode::UNAUTHORIZED, "invalid bearer token".to_string()))?;
    match state.storage.user_by_email(&claims.email) {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err((StatusCode::UNAUTHORIZED, "unknown user".to_string())),
        Err(err) => Err((StatusCode::INTERNAL_SERVER_ERROR, err.to_string())),
    }
}
