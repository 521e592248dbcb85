use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use partyround::{
    api,
    config::ServerConfig,
    error::StandardError,
    room::{RoomRegistry, RoomSettings},
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "partyround=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting partyround...");

    let config = ServerConfig::from_env();
    tracing::info!(
        tick_ms = config.tick_ms,
        max_rounds = config.max_rounds,
        max_answer_chars = config.max_answer_chars,
        "Configuration loaded"
    );

    let registry = RoomRegistry::new(RoomSettings::from(&config));

    let app = api::router(registry)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            StandardError::system(format!("failed to bind {addr}: {e}")).log();
            std::process::exit(1);
        }
    };
    tracing::info!("Listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        StandardError::system(format!("server error: {e}")).log();
        std::process::exit(1);
    }
}
