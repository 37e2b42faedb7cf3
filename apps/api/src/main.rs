//! Rigger API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dto;
mod error;
mod handlers;
mod state;

use rigger_core::AppError;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api_config::{ApiConfig, AuditBackendConfig, init_tracing};
use crate::api_router::build_router;
use crate::api_services::{build_provisioning_service, connect_and_migrate};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let pool = match &config.audit_backend {
        AuditBackendConfig::Postgres {
            database_url,
            max_connections,
        } => Some(connect_and_migrate(database_url, *max_connections).await?),
        AuditBackendConfig::Memory => None,
    };

    if config.migrate_only {
        if pool.is_none() {
            return Err(AppError::Validation(
                "migrate requires AUDIT_BACKEND=postgres".to_owned(),
            ));
        }
        info!("database migrations applied successfully");
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let app_state = AppState {
        provisioning_service: build_provisioning_service(&config, pool.clone(), shutdown.clone()),
    };
    let app = build_router(app_state, &config.frontend_urls)?;

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(
        %address,
        audit_backend = config.audit_backend.name(),
        workspace_root = %config.workspace_root.display(),
        "rigger-api listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))?;

    if let Some(pool) = pool {
        pool.close().await;
    }
    info!("rigger-api stopped");

    Ok(())
}

// Running tool processes are killed as soon as the signal arrives; their
// requests finish as `failed` before the server stops accepting responses.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            error!(error = %error, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                error!(error = %error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C"),
        () = terminate => info!("received SIGTERM"),
    }

    shutdown.cancel();
}
