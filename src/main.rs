use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;

use community_push_service::config::Settings;
use community_push_service::gateway::create_push_gateway;
use community_push_service::postgres::PostgresPool;
use community_push_service::server::{create_app, AppState};
use community_push_service::store::create_document_store;
use community_push_service::tasks::SchedulerTask;
use community_push_service::telemetry::init_telemetry;
use community_push_service::triggers::Services;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new().context("Failed to load configuration")?;

    // Initialize tracing
    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!(
        store = %settings.store.backend,
        fcm_enabled = settings.fcm.enabled,
        scheduler_enabled = settings.scheduler.enabled,
        "Configuration loaded"
    );

    // PostgreSQL pool, only when the store needs it
    let postgres_pool = if settings.store.backend == "postgres" {
        let pool = PostgresPool::new(&settings.database)
            .await
            .context("Failed to connect to PostgreSQL")?;
        Some(Arc::new(pool))
    } else {
        None
    };

    // Process-wide collaborators
    let store = create_document_store(&settings.store, postgres_pool.clone()).await?;
    let gateway = create_push_gateway(&settings.fcm)?;
    let services = Arc::new(Services::from_settings(store, gateway, &settings));
    tracing::info!(
        store = services.store.backend_type(),
        gateway = services.dispatcher.gateway_name(),
        "Services initialized"
    );

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    // Start scheduled jobs in background
    let mut scheduler_handles = Vec::new();
    if settings.scheduler.enabled {
        for task in SchedulerTask::from_settings(services.clone(), &shutdown_tx)? {
            scheduler_handles.push(tokio::spawn(task.run()));
        }
    } else {
        tracing::info!("Scheduler disabled, scheduled jobs run only on demand");
    }

    // Create Axum app
    let state = AppState::new(settings.clone(), services, postgres_pool.clone());
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx))
        .await?;

    // Wait for background tasks to finish
    tracing::info!("Waiting for background tasks to finish...");
    futures::future::join_all(scheduler_handles).await;

    if let Some(pool) = postgres_pool {
        pool.close().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: tokio::sync::broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Stop scheduler tasks
    let _ = shutdown_tx.send(());
}
