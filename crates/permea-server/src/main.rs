//! Permea Server — Application entry point.
//!
//! Connects to SurrealDB, applies pending migrations, and builds the
//! repository facade. The network surface that will consume the facade
//! is not part of this crate yet.

use tracing_subscriber::EnvFilter;

use permea_db::{DbConfig, DbManager, RetryPolicy};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("permea=info")),
        )
        .json()
        .init();

    tracing::info!("Starting Permea server...");

    let config = DbConfig::from_env();
    let manager = match DbManager::connect(&config).await {
        Ok(manager) => manager,
        Err(err) => {
            tracing::error!(%err, "Failed to connect to SurrealDB");
            std::process::exit(1);
        }
    };

    if let Err(err) = permea_db::run_migrations(manager.client()).await {
        tracing::error!(%err, "Failed to apply migrations");
        std::process::exit(1);
    }

    let _service = permea_db::new_service(manager.client().clone(), RetryPolicy::default());
    tracing::info!("Repository facade ready");

    // TODO: mount an HTTP API over the facade once the transport layer
    // is decided.
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "Failed to listen for shutdown signal");
    }

    tracing::info!("Permea server stopped.");
}
