//! Main application run loop

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::AppOptions;
use crate::app::state::AppState;
use crate::errors::OrchestratorError;
use crate::server::serve::serve;
use crate::server::state::ServerState;

/// Run the orchestrator until the shutdown signal fires
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), OrchestratorError> {
    info!("Initializing deployment orchestrator...");

    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);

    let state = Arc::new(AppState::init(&options)?);

    let server_state = Arc::new(ServerState::new(
        state.router.clone(),
        state.audit.clone(),
        state.metrics.clone(),
        state.drift_executor.clone(),
    ));

    let mut server_shutdown_rx = shutdown_tx.subscribe();
    let server_handle = serve(&options.server, server_state, async move {
        let _ = server_shutdown_rx.recv().await;
    })
    .await?;

    tokio::select! {
        _ = shutdown_signal => {
            info!("Shutdown signal received, shutting down...");
        }
    }

    let _ = shutdown_tx.send(());
    shutdown(&state, server_handle, options.lifecycle.max_shutdown_delay).await
}

async fn shutdown(
    state: &AppState,
    server_handle: JoinHandle<Result<(), OrchestratorError>>,
    max_delay: Duration,
) -> Result<(), OrchestratorError> {
    info!("Shutting down orchestrator...");

    // In-flight deployments observe cancellation and record CANCELLED
    // through their own workers.
    state.router.cancel_all();

    match tokio::time::timeout(max_delay, server_handle).await {
        Ok(joined) => {
            joined.map_err(|e| OrchestratorError::Server(e.to_string()))??;
        }
        Err(_) => {
            error!("Shutdown timed out after {:?}, forcing exit...", max_delay);
            std::process::exit(1);
        }
    }

    info!("Shutdown complete");
    Ok(())
}
