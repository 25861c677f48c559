//! Housing Server - Main entry point

use clap::Parser;
use std::sync::Arc;

use housing_core::{
    api::{self, AppState},
    auth::{CredentialHasher, TokenService},
    config::{Config, StoreBackend},
    db::PgStore,
    observability,
    store::{IdentityStore, InMemoryStore},
};

#[derive(Parser)]
#[command(name = "housing-server")]
#[command(about = "Housing portal identity and access API", version)]
struct Args {
    /// Configuration file (environment variables still override it)
    #[arg(short, long, env = "HOUSING_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load configuration
    let config = match args.config.as_deref() {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    // Initialize observability
    observability::init("housing-server", &config.observability)?;
    let metrics_handle = observability::metrics::init_metrics(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        store = ?config.store.backend,
        "Starting Housing Server"
    );
    if config.has_weak_secret() {
        tracing::warn!("auth.jwt_secret is shorter than 32 bytes");
    }

    // Identity store
    let store: Arc<dyn IdentityStore> = match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory identity store; identities are lost on restart");
            Arc::new(InMemoryStore::new())
        }
        StoreBackend::Postgres => {
            let pg = PgStore::connect(&config.store).await?;
            pg.migrate().await?;
            tracing::info!("Identity database migrations applied");
            Arc::new(pg)
        }
    };

    let hasher = Arc::new(CredentialHasher::new(&config.auth.password)?);
    let tokens = Arc::new(TokenService::new(&config.auth.jwt_secret)?);

    // Create app state
    let app_state = AppState::new(store, hasher, tokens).with_metrics(metrics_handle);

    // Build router
    let app = api::build_router(app_state);

    // Start server
    let addr = config.server.bind_address();
    tracing::info!(address = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup
    observability::shutdown();
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
