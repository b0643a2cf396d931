//! CI Relay Server: build-status push notifications for mobile devices.
//!
//! Devices register the repositories they watch. GitHub commit-status
//! webhooks are analysed for state transitions, and the devices bound to the
//! repository are pushed an alert through APNs when a build breaks or
//! recovers.

mod config;
mod error;
mod metrics;
mod migration;
mod models;
mod routes;
mod schema;
mod services;
mod store;

#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;

use crate::services::github_service::GithubStatusClient;
use crate::services::push_service::ApnsGateway;
use crate::store::{MemoryRegistrationStore, PgRegistrationStore, RegistrationStore};

#[derive(Parser)]
#[command(name = "ci-relay", about = "CI build-status push relay")]
struct Cli {
    /// Server port
    #[arg(short, long, env = "RELAY_PORT", default_value = "9090")]
    port: u16,

    /// PostgreSQL connection URL; registrations are kept in memory when unset
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Database pool size
    #[arg(long, env = "RELAY_DB_MAX_CONNECTIONS", default_value = "8")]
    max_connections: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    }

    let cli = Cli::parse();

    tracing::info!("Starting CI relay...");

    let config = config::RelayConfig::from_env();

    let store: Arc<dyn RegistrationStore> = match cli.database_url.as_deref() {
        Some(db_url) => {
            let store = PgRegistrationStore::connect(db_url, cli.max_connections)?;
            store.migrate().await?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set -- registrations are kept in memory only");
            Arc::new(MemoryRegistrationStore::new())
        }
    };

    let state = routes::RelayState {
        store,
        history: Arc::new(GithubStatusClient::new(&config)?),
        gateway: Arc::new(ApnsGateway::new(&config)?),
        config,
    };
    let app = routes::relay_router(state);

    // Initialize metrics
    metrics::init_metrics();

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    tracing::info!("CI relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
