//! Service drift detection and reconciliation
//!
//! Compares a service's live state against the task definition it is
//! expected to run and, on request, updates the service back into line.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::deploy::executor::DeployExecutor;
use crate::errors::OrchestratorError;

/// Outcome of a drift check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftState {
    None,
    Detected,
    Reconciled,
}

/// Result of a drift check or reconciliation
#[derive(Debug, Clone, Serialize)]
pub struct DriftReport {
    pub state: DriftState,
    pub findings: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

/// Check a service for drift against its expected task definition
pub async fn detect_drift(
    executor: &DeployExecutor,
    cluster: &str,
    service: &str,
    expected_task_definition: &str,
) -> Result<DriftReport, OrchestratorError> {
    info!("detecting drift for service {}", service);

    let view = executor.describe_service(cluster, service).await?;
    let mut findings = Vec::new();

    if view.task_definition != expected_task_definition {
        findings.push(format!(
            "task definition drift: expected {}, found {}",
            expected_task_definition, view.task_definition
        ));
    }
    if view.desired == 0 {
        findings.push("service scaled to zero".to_string());
    }
    if view.running < view.desired {
        findings.push(format!(
            "running count ({}) below desired ({})",
            view.running, view.desired
        ));
    }

    let state = if findings.is_empty() {
        DriftState::None
    } else {
        warn!("detected {} drift finding(s) for service {}", findings.len(), service);
        DriftState::Detected
    };

    Ok(DriftReport {
        state,
        findings,
        checked_at: Utc::now(),
    })
}

/// Detect drift and, when found, update the service back to the expected
/// task definition and wait for it to stabilize.
pub async fn reconcile_drift(
    executor: &DeployExecutor,
    cluster: &str,
    service: &str,
    expected_task_definition: &str,
) -> Result<DriftReport, OrchestratorError> {
    let mut report = detect_drift(executor, cluster, service, expected_task_definition).await?;
    if report.state == DriftState::None {
        return Ok(report);
    }

    info!("reconciling drift for service {}", service);
    executor
        .update_service(cluster, service, expected_task_definition)
        .await?;
    executor.wait_for_stable(cluster, service, None).await?;

    report.state = DriftState::Reconciled;
    info!("drift reconciled for service {}", service);
    Ok(report)
}
