// GET /api/auth/teammates  bearer  -> the caller's teammates, annotated with presence.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::state::{require_user, AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/auth/teammates", get(teammates))
}

#[derive(Serialize)]
struct TeammateView {
    id: String,
    display_name: String,
    is_active: bool,
}

async fn teammates(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = require_user(&state, &headers)?;
    let mates = state
        .storage
        .teammates_of(&user.id, &user.team_id)
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    let views: Vec<TeammateView> = mates
        .into_iter()
        .map(|mate| {
            let is_active = state.presence.is_present(&mate.id);
            TeammateView {
                id: mate.id,
                display_name: mate.display_name,
                is_active,
            }
        })
        .collect();

    Ok(Json(views))
}
