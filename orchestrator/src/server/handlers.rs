//! HTTP request handlers
//!
//! Recognized domain failures are reported as `{success: false, message}`
//! in a 200 body; transport-level errors are reserved for protocol faults
//! and panics.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::deploy::approval::ApprovalRecord;
use crate::deploy::drift::{self, DriftReport};
use crate::models::deployment::DeploymentRequest;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "conductor".to_string(),
        version: version.version,
    })
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Deploy response
#[derive(Debug, Serialize)]
pub struct DeployResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
}

/// Deploy handler: admit a deployment request
pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<DeploymentRequest>,
) -> impl IntoResponse {
    match state.router.submit(request) {
        Ok(ack) => Json(DeployResponse {
            success: true,
            message: ack.message,
            deployment_id: Some(ack.deployment_id),
        }),
        Err(err) => Json(DeployResponse {
            success: false,
            message: err.to_string(),
            deployment_id: None,
        }),
    }
}

/// Status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub phase: String,
    pub message: String,
    pub progress: u8,
}

/// Status handler: observable state of one deployment
pub async fn status_handler(
    State(state): State<Arc<ServerState>>,
    Path(deployment_id): Path<String>,
) -> impl IntoResponse {
    match state.router.status(&deployment_id) {
        Some(status) => Json(StatusResponse {
            phase: status.phase.to_string(),
            message: status.message,
            progress: status.progress,
        }),
        None => Json(StatusResponse {
            phase: "UNKNOWN".to_string(),
            message: format!("deployment not found: {}", deployment_id),
            progress: 0,
        }),
    }
}

/// Generic action response
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

/// Cancel handler: request cancellation of a running deployment
pub async fn cancel_handler(
    State(state): State<Arc<ServerState>>,
    Path(deployment_id): Path<String>,
) -> impl IntoResponse {
    match state.router.cancel(&deployment_id) {
        Ok(()) => Json(ActionResponse {
            success: true,
            message: "cancellation requested".to_string(),
        }),
        Err(err) => Json(ActionResponse {
            success: false,
            message: err.to_string(),
        }),
    }
}

/// Approval request body
#[derive(Debug, Deserialize)]
pub struct ApprovalBody {
    pub approved: bool,
    pub approver: String,
    #[serde(default)]
    pub reason: String,
}

/// Approval handler: decide a pending approval gate
pub async fn approval_handler(
    State(state): State<Arc<ServerState>>,
    Path(deployment_id): Path<String>,
    Json(body): Json<ApprovalBody>,
) -> impl IntoResponse {
    match state
        .router
        .approve(&deployment_id, body.approved, &body.approver, &body.reason)
    {
        Ok(()) => Json(ActionResponse {
            success: true,
            message: if body.approved {
                "deployment approved".to_string()
            } else {
                "deployment rejected".to_string()
            },
        }),
        Err(err) => Json(ActionResponse {
            success: false,
            message: err.to_string(),
        }),
    }
}

/// Approval record response
#[derive(Debug, Serialize)]
pub struct ApprovalStatusResponse {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<ApprovalRecord>,
}

/// Approval status handler: current approval record, if any
pub async fn approval_status_handler(
    State(state): State<Arc<ServerState>>,
    Path(deployment_id): Path<String>,
) -> impl IntoResponse {
    let record = state.router.approval(&deployment_id);
    Json(ApprovalStatusResponse {
        found: record.is_some(),
        record,
    })
}

/// Rollback request body
#[derive(Debug, Deserialize)]
pub struct RollbackBody {
    pub cluster: String,
    pub service: String,
}

/// Rollback handler: restore the previous task definition
pub async fn rollback_handler(
    State(state): State<Arc<ServerState>>,
    Path(deployment_id): Path<String>,
    Json(body): Json<RollbackBody>,
) -> impl IntoResponse {
    match state
        .router
        .rollback(&deployment_id, &body.cluster, &body.service)
        .await
    {
        Ok(()) => Json(ActionResponse {
            success: true,
            message: "rollback initiated".to_string(),
        }),
        Err(err) => Json(ActionResponse {
            success: false,
            message: format!("rollback failed: {}", err),
        }),
    }
}

/// Strategies response
#[derive(Debug, Serialize)]
pub struct StrategiesResponse {
    pub strategies: Vec<String>,
}

/// Strategies handler: enumerate the registry
pub async fn strategies_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(StrategiesResponse {
        strategies: state.router.list_strategies(),
    })
}

/// Audit query parameters
#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

/// Audit handler: most recent audit events
pub async fn audit_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<AuditQuery>,
) -> impl IntoResponse {
    Json(state.audit.recent(query.limit.unwrap_or(100)))
}

/// Drift request body
#[derive(Debug, Deserialize)]
pub struct DriftBody {
    pub cluster: String,
    pub service: String,
    pub expected_task_definition: String,
    #[serde(default)]
    pub reconcile: bool,
}

/// Drift response
#[derive(Debug, Serialize)]
pub struct DriftResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<DriftReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Drift handler: detect (and optionally reconcile) service drift
pub async fn drift_handler(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<DriftBody>,
) -> impl IntoResponse {
    let result = if body.reconcile {
        drift::reconcile_drift(
            &state.drift_executor,
            &body.cluster,
            &body.service,
            &body.expected_task_definition,
        )
        .await
    } else {
        drift::detect_drift(
            &state.drift_executor,
            &body.cluster,
            &body.service,
            &body.expected_task_definition,
        )
        .await
    };

    match result {
        Ok(report) => Json(DriftResponse {
            success: true,
            report: Some(report),
            message: None,
        }),
        Err(err) => Json(DriftResponse {
            success: false,
            report: None,
            message: Some(err.to_string()),
        }),
    }
}

/// Metrics handler: snapshot of the in-process recorder
pub async fn metrics_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}
