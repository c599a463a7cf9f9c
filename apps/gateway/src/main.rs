// Gateway entrypoint (Axum + Tokio)
//
// This file wires up shared services (storage/bus/presence/rate/token issuer),
// builds the HTTP router from the route modules, attaches middleware layers
// (rate limit, CORS, trace, timeout, compression), and starts listening for
// requests with graceful shutdown.
use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{extract::DefaultBodyLimit, middleware, Router};
use axum::error_handling::HandleErrorLayer;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Method,
};
use tokio::{net::TcpListener, signal};
use tower::timeout::TimeoutLayer;
use tower::{BoxError, ServiceBuilder};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use bus::pubsub::Publisher;
use presence::PresenceRegistry;
use storage::Storage;
use tokens::TokenIssuer;

mod init;
mod middleware;
mod routes;
mod state;

use crate::middleware as gw_mw;
use crate::state::{AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                let level = if std::env::var("HUB_DEBUG").ok().as_deref() == Some("true") {
                    "debug"
                } else {
                    "info"
                };
                tracing_subscriber::EnvFilter::new(level)
            }),
        )
        .init();

    let config = Config::from_env()?;

    let storage: Arc<Storage> = Arc::new(Storage::new(&config.db_path)?);
    let publisher: Arc<Publisher> = Arc::new(Publisher::bind(&config.bus_addr)?);
    let presence = PresenceRegistry::new();
    let rate_limiter = Arc::new(rate::RateLimiter::new(5, 1.0));
    let issuer = Arc::new(TokenIssuer::new(
        config.livekit_api_key.clone(),
        config.livekit_api_secret.clone(),
    ));

    let state = AppState {
        publisher,
        storage,
        presence,
        rate: rate_limiter,
        issuer,
        bus_addr: config.bus_addr.clone(),
        livekit_server_url: config.livekit_server_url.clone(),
    };

    if let Err(err) = init::seed_dev_data(&state) {
        tracing::error!(err = ?err, "dev data seeding failed");
    }

    let cors_layer: CorsLayer = {
        let methods = [Method::GET, Method::POST, Method::OPTIONS];
        let default = vec![
            axum::http::HeaderValue::from_static("http://127.0.0.1:5173"),
            axum::http::HeaderValue::from_static("http://localhost:5173"),
        ];
        let origins: Vec<axum::http::HeaderValue> = std::env::var("CORS_ALLOW_ORIGINS")
            .ok()
            .and_then(|s| {
                let list: Vec<_> = s
                    .split(',')
                    .filter_map(|o| axum::http::HeaderValue::from_str(o.trim()).ok())
                    .collect();
                if list.is_empty() {
                    None
                } else {
                    Some(list)
                }
            })
            .unwrap_or(default);
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION])
            .allow_origin(AllowOrigin::list(origins))
    };

    let base: Router<_> = routes::all().with_state(state.clone());

    async fn handle_timeout_error(err: BoxError) -> axum::response::Response {
        use axum::response::IntoResponse;
        if err.is::<tower::timeout::error::Elapsed>() {
            (axum::http::StatusCode::REQUEST_TIMEOUT, "request timed out").into_response()
        } else {
            (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
    let timeout_stack = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(handle_timeout_error))
        .layer(TimeoutLayer::new(Duration::from_secs(10)));

    let app: Router<_> = base
        .layer(middleware::from_fn_with_state(
            state.clone(),
            gw_mw::rate_limit_middleware,
        ))
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .layer(timeout_stack)
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(1024 * 1024));

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
