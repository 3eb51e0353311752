//! Worm arena WebSocket server
//!
//! One process hosts any number of arenas, one per stake tier, each on its
//! own simulation task.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wormstake_server::config::{Rules, DEMO_OPENING_BALANCE, SERVER_PORT, SETTLEMENT_LOG_FILE};
use wormstake_server::settlement::SettlementLog;
use wormstake_server::state::AppState;
use wormstake_server::wallet::{InMemoryWallet, WalletService};
use wormstake_server::ws::ws_handler;

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wormstake_server=debug,tower_http=debug".into()),
        )
        .init();

    // The in-memory wallet stands in for the external wallet service
    let wallet: Arc<dyn WalletService> =
        Arc::new(InMemoryWallet::with_opening_balance(DEMO_OPENING_BALANCE));
    let settlements = SettlementLog::to_file(SETTLEMENT_LOG_FILE);
    let state = Arc::new(AppState::new(wallet, settlements, Rules::default()));

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the router
    let app = Router::new()
        .route("/ws/game", get(ws_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state);

    // Start the server
    let addr = format!("0.0.0.0:{}", SERVER_PORT);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();

    info!("🪱 worm arena server running on http://{}", addr);
    info!(
        "   WebSocket endpoint: ws://localhost:{}/ws/game",
        SERVER_PORT
    );

    axum::serve(listener, app).await.unwrap();
}
