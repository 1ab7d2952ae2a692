//! Seven Seas Sync - mirrors the on-chain board into scene actors
//!
//! This is the main entry point for the sync process. It handles:
//! - Reconciling each board snapshot against live ships and chests
//! - Optimistic movement prediction for direction input
//! - A WebSocket bridge carrying snapshots in and scene effects out

mod app;
mod config;
mod game;
mod http;
mod util;
mod ws;

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::{Config, LogFormat};
use crate::game::SyncSession;
use crate::http::build_router;
use crate::util::time::init_process_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level, config.log_format);

    init_process_time();

    info!("Starting Seven Seas sync");
    info!("Bridge address: {}", config.server_addr);
    info!(local_identity = %config.local_identity, "Local player");

    // The session task is the only owner of the actor registry
    let (session, handle) =
        SyncSession::new(config.local_identity.clone(), config.event_queue_capacity);
    let session_task = tokio::spawn(session.run());

    let state = AppState::new(config.clone(), handle);
    let router = build_router(state);

    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Bridge listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Open bridge sockets may still hold senders; don't wait on them forever
    if tokio::time::timeout(Duration::from_secs(2), session_task)
        .await
        .is_err()
    {
        warn!("Sync session still busy at shutdown, dropping it");
    }

    info!("Sync shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
