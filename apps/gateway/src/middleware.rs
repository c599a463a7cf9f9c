// Cross-cutting middleware
//
// rate_limit_middleware derives a per-user (or anonymous) rate key and throttles
// requests using an in-process token bucket. The websocket upgrade and health check
// are exempt: throttling a long-lived connection upgrade or a liveness probe would
// just cause confusing failures elsewhere.

use axum::body::Body;
use axum::{
    extract::State,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::state::{extract_token, AppState};

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: axum::http::Request<Body>,
    next: Next,
) -> Response {
    let rate_key: String = extract_token(req.headers())
        .and_then(|tok| auth::verify_jwt(&tok).ok().map(|data| data.claims.email))
        .unwrap_or_else(|| "anon".to_string());

    let path = req.uri().path();
    if path.starts_with("/api/auth/websocket") || path.starts_with("/healthz") {
        return next.run(req).await;
    }

    if !state.rate.allow(&rate_key) {
        return (StatusCode::TOO_MANY_REQUESTS, "rate limit").into_response();
    }

    next.run(req).await
}
