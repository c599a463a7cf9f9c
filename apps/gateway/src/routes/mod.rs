// Route module aggregator
//
// Each submodule defines a focused set of routes. This module exposes a
// single `all()` function to compose them into one router which is then
// wired up in main.rs.
use crate::state::AppState;
use axum::Router;

pub mod livekit;
pub mod root;
pub mod teammates;
pub mod watercooler;
pub mod websocket;

/// Merge all route groups into a single router.
pub fn all() -> Router<AppState> {
    Router::new()
        .merge(root::router())
        .merge(websocket::router())
        .merge(watercooler::router())
        .merge(teammates::router())
        .merge(livekit::router())
}
