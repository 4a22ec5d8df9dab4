//! Accolade - an achievement badge awarding engine for content platforms.
//!
//! # API Endpoints
//!
//! - `POST /recalculate` - Run a badge recalculation pass (one user or bulk)
//! - `POST /events` - Record an activity event
//! - `GET /leaderboard` - Rank users by a metric
//! - `GET /badges` - List the active badge catalog
//! - `POST /badges/refresh` - Reload the catalog from the store
//! - `GET /awards` - List a user's awards
//! - `GET /health` - Health check

use std::env;
use std::net::SocketAddr;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use accolade::api::{
    AppState, get_awards, get_badges, get_leaderboard, health_check, post_event,
    post_recalculate, post_refresh_catalog,
};
use accolade::catalog::BadgeCatalog;
use accolade::leaderboard::LeaderboardService;
use accolade::notify::AwardNotifier;
use accolade::recalc::RecalculationService;
use accolade::storage::Storage;

/// Default port if not specified via environment variable.
const DEFAULT_PORT: u16 = 3000;

/// Default database path if not specified via environment variable.
const DEFAULT_DB_PATH: &str = "sqlite:accolade.db?mode=rwc";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with environment filter
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("accolade=info".parse()?))
        .init();

    // Load configuration from environment
    let port: u16 = env::var("ACCOLADE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let db_url = env::var("ACCOLADE_DATABASE_URL").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());

    // Award notifications are optional; without a webhook the engine still
    // awards, it just logs instead of notifying.
    let notifier = env::var("ACCOLADE_NOTIFY_URL")
        .ok()
        .map(|url| AwardNotifier::new(&url));

    info!(port, db_url = %db_url, notify = notifier.is_some(), "Starting Accolade server");

    // Initialize storage and load the badge catalog
    let storage = Storage::new(&db_url).await?;
    let catalog = BadgeCatalog::new(storage.clone());
    let badges = catalog.initialize().await?;
    info!(badges, "Database initialized");

    // Create application state
    let state = AppState {
        recalc: RecalculationService::new(storage.clone(), catalog.clone(), notifier),
        leaderboard: LeaderboardService::new(storage.clone()),
        catalog,
        storage,
    };

    // Build router
    let app = Router::new()
        .route("/recalculate", post(post_recalculate))
        .route("/events", post(post_event))
        .route("/leaderboard", get(get_leaderboard))
        .route("/badges", get(get_badges))
        .route("/badges/refresh", post(post_refresh_catalog))
        .route("/awards", get(get_awards))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Accolade is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
