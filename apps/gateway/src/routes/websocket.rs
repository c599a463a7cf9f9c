// WebSocket endpoint `/api/auth/websocket`
//
// Upgrade requires a valid bearer token, read from the `Authorization` header or a
// `token` query parameter. Once the token resolves to a user, the connection is
// handed off to `signaling::Session`, which owns it for the rest of its life.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::sync::Arc;

use crate::state::AppState;
use signaling::{CallCoordinator, Router as SignalingRouter, Session};

#[derive(Deserialize)]
pub struct TokenQuery {
    token: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/auth/websocket", get(websocket_handler))
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(q): Query<TokenQuery>,
    headers: axum::http::HeaderMap,
) -> impl IntoResponse {
    let token = q.token.or_else(|| crate::state::extract_token(&headers));

    let Some(token) = token else {
        return (axum::http::StatusCode::UNAUTHORIZED, "missing bearer token").into_response();
    };
    let claims = match auth::verify_jwt(&token) {
        Ok(data) => data.claims,
        Err(_) => {
            return (axum::http::StatusCode::UNAUTHORIZED, "invalid bearer token").into_response()
        }
    };
    let user = match state.storage.user_by_email(&claims.email) {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (axum::http::StatusCode::UNAUTHORIZED, "unknown user").into_response()
        }
        Err(err) => {
            tracing::error!(err = %err, "storage lookup failed during websocket upgrade");
            return (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "storage error").into_response();
        }
    };

    let signaling_router = Arc::new(SignalingRouter::new(state.publisher.clone(), state.presence));
    let coordinator = Arc::new(CallCoordinator::new(
        state.storage.clone(),
        state.issuer.clone(),
        signaling_router.clone(),
    ));
    let session = Session::new(
        user,
        state.bus_addr.clone(),
        state.storage.clone(),
        state.presence,
        signaling_router,
        coordinator,
    );

    ws.on_upgrade(move |socket| session.run(socket))
}
