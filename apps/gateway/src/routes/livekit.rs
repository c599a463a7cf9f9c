// GET /api/auth/livekit/server-url  bearer  -> {url} of the SFU clients should connect to.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::state::{require_user, AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/auth/livekit/server-url", get(server_url))
}

#[derive(Serialize)]
struct ServerUrlResponse {
    url: String,
}

async fn server_url(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_user(&state, &headers)?;
    Ok(Json(ServerUrlResponse {
        url: state.livekit_server_url.clone(),
    }))
}
