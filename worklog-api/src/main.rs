//! # Worklog API Server
//!
//! Serves the worklog dashboard, its JSON API and the task change feed.
//!
//! ## Architecture
//!
//! The API server is built with Axum and provides:
//! - Session endpoints backed by the hosted identity provider
//! - Task CRUD with attachments stored in the hosted object store
//! - SSE change feed fed by PostgreSQL `LISTEN/NOTIFY`
//! - Server-rendered auth and dashboard pages
//!
//! `WORKLOG_BACKEND=memory` swaps every backend collaborator for an
//! in-process one, so the server runs without any external service.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p worklog-api
//! ```

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use worklog_api::{
    app::{build_router, AppState, Backend},
    config::{BackendKind, Config},
};
use worklog_shared::{
    db::{migrations, pool},
    events::{spawn_pg_listener, ChangeHub},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "worklog_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Worklog API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;
    let changes = ChangeHub::default();
    let shutdown = CancellationToken::new();

    let (backend, db, listener) = match config.backend.kind {
        BackendKind::Hosted => {
            let database = config
                .database
                .clone()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

            let db = pool::create_pool(pool::DatabaseConfig {
                url: database.url,
                max_connections: database.max_connections,
                ..Default::default()
            })
            .await?;
            migrations::run_migrations(&db).await?;

            let listener = spawn_pg_listener(db.clone(), changes.clone(), shutdown.clone());
            let backend = Backend::hosted(&config, db.clone())?;
            (backend, Some(db), Some(listener))
        }
        BackendKind::Memory => {
            tracing::warn!("Using the in-memory backend; data is lost on exit");
            (Backend::memory(&config, changes.clone())?, None, None)
        }
    };

    let bind_address = config.bind_address();
    let app = build_router(AppState::new(config, backend, changes, db.clone()));

    let tcp = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(tcp, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    tracing::info!("Shutdown signal received, exiting...");

    shutdown.cancel();
    if let Some(listener) = listener {
        if let Err(e) = listener.await {
            tracing::warn!(error = %e, "Change listener task failed");
        }
    }
    if let Some(db) = db {
        pool::close_pool(db).await;
    }

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
    }
    shutdown.cancel();
}
