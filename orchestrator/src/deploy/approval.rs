//! Deployment approval gate
//!
//! Holds one approval record per gated deployment. Records move from
//! pending to approved or rejected exactly once; the owning worker polls
//! `wait` until the record is terminal or the timeout fires.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::errors::OrchestratorError;

/// State of an approval request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalState {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApprovalState::Pending => "pending",
            ApprovalState::Approved => "approved",
            ApprovalState::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// One approval request
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalRecord {
    pub deployment_id: String,
    pub cluster: String,
    pub service: String,
    pub strategy: String,
    pub requested_at: DateTime<Utc>,
    pub state: ApprovalState,
    pub approver: String,
    pub reason: String,
}

/// Approval records keyed by deployment id
#[derive(Default)]
pub struct ApprovalManager {
    records: RwLock<HashMap<String, ApprovalRecord>>,
}

impl ApprovalManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pending approval request for a deployment
    pub fn request(&self, deployment_id: &str, cluster: &str, service: &str, strategy: &str) {
        let record = ApprovalRecord {
            deployment_id: deployment_id.to_string(),
            cluster: cluster.to_string(),
            service: service.to_string(),
            strategy: strategy.to_string(),
            requested_at: Utc::now(),
            state: ApprovalState::Pending,
            approver: String::new(),
            reason: String::new(),
        };

        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert(deployment_id.to_string(), record);

        info!(
            "deployment {} requires approval (cluster: {}, service: {}, strategy: {})",
            deployment_id, cluster, service, strategy
        );
    }

    pub fn approve(
        &self,
        deployment_id: &str,
        approver: &str,
        reason: &str,
    ) -> Result<(), OrchestratorError> {
        self.transition(deployment_id, ApprovalState::Approved, approver, reason)
    }

    pub fn reject(
        &self,
        deployment_id: &str,
        approver: &str,
        reason: &str,
    ) -> Result<(), OrchestratorError> {
        self.transition(deployment_id, ApprovalState::Rejected, approver, reason)
    }

    fn transition(
        &self,
        deployment_id: &str,
        state: ApprovalState,
        approver: &str,
        reason: &str,
    ) -> Result<(), OrchestratorError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let record = records.get_mut(deployment_id).ok_or_else(|| {
            OrchestratorError::NotFound(format!("approval request for deployment {}", deployment_id))
        })?;

        if record.state != ApprovalState::Pending {
            return Err(OrchestratorError::AlreadyDecided(format!(
                "deployment {} already {}",
                deployment_id, record.state
            )));
        }

        record.state = state;
        record.approver = approver.to_string();
        record.reason = reason.to_string();

        info!(
            "deployment {} {} by {}: {}",
            deployment_id, state, approver, reason
        );
        Ok(())
    }

    pub fn get(&self, deployment_id: &str) -> Option<ApprovalRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.get(deployment_id).cloned()
    }

    /// Poll the record at `poll_interval` until it is terminal, the timeout
    /// elapses, or the deployment is cancelled.
    pub async fn wait(
        &self,
        deployment_id: &str,
        timeout: Duration,
        poll_interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), OrchestratorError> {
        let deadline = Instant::now() + timeout;

        info!(
            "waiting for approval of deployment {} (timeout: {:?})",
            deployment_id, timeout
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
                _ = tokio::time::sleep(poll_interval) => {}
            }

            if Instant::now() >= deadline {
                return Err(OrchestratorError::ApprovalTimeout(format!(
                    "deployment {} was not decided within {:?}",
                    deployment_id, timeout
                )));
            }

            let record = self.get(deployment_id).ok_or_else(|| {
                OrchestratorError::NotFound(format!(
                    "approval request for deployment {}",
                    deployment_id
                ))
            })?;

            match record.state {
                ApprovalState::Pending => {}
                ApprovalState::Approved => {
                    info!("deployment {} approved, proceeding", deployment_id);
                    return Ok(());
                }
                ApprovalState::Rejected => {
                    return Err(OrchestratorError::ApprovalRejected(format!(
                        "deployment {} rejected by {}",
                        deployment_id, record.approver
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approve_transitions_from_pending() {
        let manager = ApprovalManager::new();
        manager.request("d1", "c", "s", "canary");

        manager.approve("d1", "alice", "lgtm").unwrap();

        let record = manager.get("d1").unwrap();
        assert_eq!(record.state, ApprovalState::Approved);
        assert_eq!(record.approver, "alice");
    }

    #[test]
    fn terminal_records_cannot_be_redecided() {
        let manager = ApprovalManager::new();
        manager.request("d1", "c", "s", "canary");
        manager.reject("d1", "bob", "nope").unwrap();

        let err = manager.approve("d1", "alice", "lgtm").unwrap_err();
        assert!(matches!(err, OrchestratorError::AlreadyDecided(_)));
    }

    #[test]
    fn unknown_deployment_is_not_found() {
        let manager = ApprovalManager::new();
        let err = manager.approve("ghost", "alice", "lgtm").unwrap_err();
        assert!(matches!(err, OrchestratorError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_returns_once_approved() {
        let manager = ApprovalManager::new();
        manager.request("d1", "c", "s", "canary");
        manager.approve("d1", "alice", "lgtm").unwrap();

        let result = manager
            .wait(
                "d1",
                Duration::from_secs(60),
                Duration::from_millis(50),
                &CancellationToken::new(),
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_surfaces_rejection() {
        let manager = ApprovalManager::new();
        manager.request("d1", "c", "s", "canary");
        manager.reject("d1", "bob", "nope").unwrap();

        let err = manager
            .wait(
                "d1",
                Duration::from_secs(60),
                Duration::from_millis(50),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::ApprovalRejected(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_on_undecided_request() {
        let manager = ApprovalManager::new();
        manager.request("d1", "c", "s", "canary");

        let err = manager
            .wait(
                "d1",
                Duration::from_millis(200),
                Duration::from_millis(50),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::ApprovalTimeout(_)));
    }
}
