//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::OrchestratorError;
use crate::server::handlers::{
    approval_handler, approval_status_handler, audit_handler, cancel_handler, deploy_handler,
    drift_handler, health_handler, metrics_handler, rollback_handler, status_handler,
    strategies_handler, version_handler,
};
use crate::server::state::ServerState;

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), OrchestratorError>>, OrchestratorError> {
    let app = Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Deployments
        .route("/deployments", post(deploy_handler))
        .route("/deployments/{id}", get(status_handler))
        .route("/deployments/{id}/cancel", post(cancel_handler))
        .route(
            "/deployments/{id}/approval",
            post(approval_handler).get(approval_status_handler),
        )
        .route("/deployments/{id}/rollback", post(rollback_handler))
        // Strategies
        .route("/strategies", get(strategies_handler))
        // Services
        .route("/services/drift", post(drift_handler))
        // Observability
        .route("/audit/events", get(audit_handler))
        .route("/telemetry/metrics", get(metrics_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new());

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| OrchestratorError::Server(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| OrchestratorError::Server(e.to_string()))
    });

    Ok(handle)
}
