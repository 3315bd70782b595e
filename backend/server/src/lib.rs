//! Leggy leaderboard API.
//!
//! Read-only REST surface for the web frontend plus the background jobs that
//! keep Discord profiles fresh. Registration and posting live in the `process` CLI.
//!
//!
//!
//! # General Infrastructure
//! - Frontend talks to this server over plain JSON
//! - Server and CLI share one Redis instance through the `board` crate
//! - `REDIS_URL` is required; the server refuses to start without it
//! - Discord is only reached over REST, never the gateway
//!
//!
//!
//! # Endpoints
//!
//! | Method | Path | Notes |
//! |---|---|---|
//! | GET | `/health` | liveness plus server time |
//! | GET | `/api/v1/latest?page=&limit=` | newest leggies first |
//! | GET | `/api/v1/users/{id}/leggies?page=&limit=` | one user's leggies |
//! | GET | `/api/v1/leaderboard` | totals with tied ranks |
//!
//! Pagination is offset based: `page` starts at 1, `limit` defaults to 10 and caps at 100.
//!
//!
//!
//! # Notes
//!
//! ## Ranks
//! The leaderboard endpoint ranks with the same rules as the posted Discord board,
//! so `[10, 10, 7]` comes back as ranks `[1, 1, 3]`.
//!
//! ## Profiles
//! Display names and avatars are cached per user and refetched every 3 hours.
//! Users without a cached profile come back with `null` name and avatar.
//!
//!
//!
//! # Setup
//!
//! Run locally with logs against a local Redis.
//! ```sh
//! REDIS_URL=redis://127.0.0.1:6379 RUST_LOG=info cargo run -p server
//! ```
use std::{error::Error, sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::get,
};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio::{net::TcpListener, signal::ctrl_c};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod error;
pub mod jobs;
pub mod routes;
pub mod state;

use jobs::start_jobs;
use routes::{
    health_handler, latest_handler, leaderboard_handler, not_found_handler, user_leggies_handler,
};
use state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/latest", get(latest_handler))
        .route("/api/v1/users/{id}/leggies", get(user_leggies_handler))
        .route("/api/v1/leaderboard", get(leaderboard_handler))
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> Result<(), Box<dyn Error + Send + Sync>> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await?;

    let jobs = start_jobs(state.clone());

    info!("Starting server...");

    let app = build_router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(jobs) = jobs {
        jobs.abort();
    }

    info!("Server shutting down...");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        } else {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
