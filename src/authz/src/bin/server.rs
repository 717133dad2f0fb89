//! # AuthOne Access API server
//!
//! Serves the authorization core over HTTP.
//!
//! ## Endpoints
//!
//! - `POST /v1/check` - Access check
//! - `POST|DELETE /v1/roles/:role_id/permissions/:permission_id`
//! - `POST|DELETE /v1/accounts/:account_id/roles/:role_id`
//! - `POST|DELETE /v1/groups/:group_id/roles/:role_id`
//! - `POST|DELETE /v1/accounts/:account_id/groups/:group_id`
//! - `POST /v1/rebuild` - Rebuild the rule store from the repository
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics (metrics port)
//!
//! ## Configuration
//!
//! See [`authone_authz::config`]; `RUST_LOG` sets the log filter (default: info).
//! With `DATABASE_URL` set the PostgreSQL repository is used, otherwise an
//! in-memory repository seeded from `SEED_FILE` (or empty).

use anyhow::Context;
use authone_authz::http::{create_metrics_router, create_router, AppState};
use authone_authz::repository::{EntityRepository, InMemoryRepository};
use authone_authz::AuthzConfig;
use axum::serve;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "postgres")]
async fn open_postgres(config: &AuthzConfig) -> anyhow::Result<Option<Arc<dyn EntityRepository>>> {
    let Some(url) = &config.database_url else {
        return Ok(None);
    };

    let repo = authone_authz::repository::PostgresRepository::new(url)
        .await
        .context("connecting to PostgreSQL")?;
    repo.run_migrations().await.context("running migrations")?;
    info!("Using PostgreSQL repository");
    Ok(Some(Arc::new(repo)))
}

#[cfg(not(feature = "postgres"))]
async fn open_postgres(config: &AuthzConfig) -> anyhow::Result<Option<Arc<dyn EntityRepository>>> {
    if config.database_url.is_some() {
        warn!("DATABASE_URL ignored: built without the postgres feature");
    }
    Ok(None)
}

async fn open_repository(config: &AuthzConfig) -> anyhow::Result<Arc<dyn EntityRepository>> {
    if let Some(repo) = open_postgres(config).await? {
        return Ok(repo);
    }

    let repo = match &config.seed_file {
        Some(path) => InMemoryRepository::from_json_file(path)
            .with_context(|| format!("loading seed file {}", path.display()))?,
        None => {
            warn!("No DATABASE_URL or SEED_FILE set, starting with an empty repository");
            InMemoryRepository::new()
        }
    };
    info!("Using in-memory repository");
    Ok(Arc::new(repo))
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }

    info!("Starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting AuthOne Access API v{}", authone_authz::VERSION);

    let config = AuthzConfig::from_env().context("loading configuration")?;
    info!("Configuration:");
    info!("  Address: {}", config.server.bind_address());
    info!("  Metrics Address: {}", config.server.metrics_address());
    info!("  Cache: enabled={}, size={}, ttl={:?}", config.cache.enabled, config.cache.capacity, config.cache.ttl);
    info!("  Resource paths: {:?}", config.resource_paths);

    let repository = open_repository(&config).await?;
    let state = Arc::new(AppState::from_config(&config, repository));

    let stats = state.sync.rebuild().await.context("initial rule store rebuild")?;
    info!(
        "Rule store ready: {} roles, {} groups, {} accounts, {} edges",
        stats.roles, stats.groups, stats.accounts, stats.edges
    );

    let app = create_router(state.clone());
    let metrics_app = create_metrics_router(state);

    let listener = tokio::net::TcpListener::bind(config.server.bind_address())
        .await
        .with_context(|| format!("binding {}", config.server.bind_address()))?;
    let metrics_listener = tokio::net::TcpListener::bind(config.server.metrics_address())
        .await
        .with_context(|| format!("binding {}", config.server.metrics_address()))?;

    info!("Starting HTTP server on {}", config.server.bind_address());
    info!("Starting metrics server on {}", config.server.metrics_address());

    let server = serve(listener, app.into_make_service()).with_graceful_shutdown(shutdown_signal());
    let metrics_server = serve(metrics_listener, metrics_app.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    tokio::try_join!(
        async { server.await.context("HTTP server") },
        async { metrics_server.await.context("metrics server") },
    )?;

    info!("Servers shut down gracefully");
    Ok(())
}
