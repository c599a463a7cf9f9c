// Always-on team call room.
//
// GET /api/auth/watercooler            bearer  -> {audioToken, videoToken, participant}
// GET /api/auth/watercooler/anonymous  bearer  -> {redirect_url}
// GET /api/watercooler/meet-redirect   none    -> 302 to the SFU-hosted client

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Redirect};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::state::{require_user, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/watercooler", get(watercooler))
        .route("/api/auth/watercooler/anonymous", get(anonymous_redirect_link))
        .route("/api/watercooler/meet-redirect", get(meet_redirect))
}

#[derive(Serialize)]
struct CallGrantResponse {
    #[serde(rename = "audioToken")]
    audio_token: String,
    #[serde(rename = "videoToken")]
    video_token: String,
    participant: String,
}

async fn watercooler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = require_user(&state, &headers)?;
    let team = state
        .storage
        .team_by_id(&user.team_id)
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "unknown team".to_string()))?;

    let room = team.watercooler_room();
    let tokens = state
        .issuer
        .mint_call_tokens(&room, &user.id, &user.display_name)
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    Ok(Json(CallGrantResponse {
        audio_token: tokens.audio_token,
        video_token: tokens.video_token,
        participant: room,
    }))
}

#[derive(Serialize)]
struct RedirectLinkResponse {
    redirect_url: String,
}

async fn anonymous_redirect_link(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = require_user(&state, &headers)?;
    let token = tokens::mint_anonymous_redirect(&user.team_id)
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    Ok(Json(RedirectLinkResponse {
        redirect_url: format!("/api/watercooler/meet-redirect?token={token}"),
    }))
}

#[derive(Deserialize)]
struct MeetRedirectQuery {
    token: String,
}

async fn meet_redirect(
    State(state): State<AppState>,
    Query(q): Query<MeetRedirectQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let claims = tokens::verify_anonymous_redirect(&q.token)
        .map_err(|_| (StatusCode::UNAUTHORIZED, "invalid or expired redirect token".to_string()))?;
    let team = state
        .storage
        .team_by_id(&claims.team_id)
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "unknown team".to_string()))?;

    let identity = tokens::anonymous_identity();
    let grant = state
        .issuer
        .mint_anonymous_grant(&team.watercooler_room(), &identity)
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    let destination = format!(
        "{}/rooms/{}?token={}",
        state.livekit_server_url,
        team.watercooler_room(),
        grant
    );
    Ok(Redirect::to(&destination))
}
