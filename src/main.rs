use axum::Router;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use ticketing_server::bootstrap::{ensure_admin, spawn_session_purge, SESSION_PURGE_INTERVAL};
use ticketing_server::config::{Config, StorageBackend};
use ticketing_server::routes::create_routes;
use ticketing_server::state::AppState;
use ticketing_server::storage::{MemoryStorage, PgStorage, Storage};

const DEFAULT_LOG_FILTER: &str = "info,tower_http=info,sqlx=warn";

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    let storage: Arc<dyn Storage> = match config.storage_backend {
        StorageBackend::Postgres => {
            let storage =
                PgStorage::connect(&config.database_url, config.database_max_connections)
                    .await
                    .expect("Failed to connect to database");
            tracing::info!("Successfully connected to database");

            storage.migrate().await.expect("Failed to run migrations");
            tracing::info!("Migrations run successfully");
            Arc::new(storage)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data is lost on restart");
            Arc::new(MemoryStorage::new())
        }
    };

    ensure_admin(storage.as_ref(), config.admin.as_ref())
        .await
        .expect("Failed to bootstrap admin account");
    let purge = spawn_session_purge(storage.clone(), SESSION_PURGE_INTERVAL);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app: Router = create_routes(AppState::new(storage, config));

    tracing::info!("Server running at http://{}", addr);
    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failed");

    purge.abort();
    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
