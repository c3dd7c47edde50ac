//! Audit log
//!
//! Append-only JSON-lines sink with a bounded in-memory queue for status
//! queries. Writing is best-effort; a missing or unwritable log file never
//! affects deployments.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::OrchestratorError;
use crate::models::deployment::{DeploymentPhase, DeploymentRequest};

/// Default bound on the in-memory event queue
pub const DEFAULT_MAX_EVENTS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditEventKind {
    #[serde(rename = "deployment.started")]
    DeploymentStarted,
    #[serde(rename = "deployment.completed")]
    DeploymentCompleted,
    #[serde(rename = "deployment.failed")]
    DeploymentFailed,
    #[serde(rename = "deployment.cancelled")]
    DeploymentCancelled,
    #[serde(rename = "deployment.rollback")]
    DeploymentRollback,
    #[serde(rename = "approval.requested")]
    ApprovalRequested,
    #[serde(rename = "approval.granted")]
    ApprovalGranted,
    #[serde(rename = "approval.rejected")]
    ApprovalRejected,
}

/// One audit event, serialized as a single JSON line
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: AuditEventKind,
    pub deployment_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEvent {
    fn new(kind: AuditEventKind, deployment_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            deployment_id: deployment_id.to_string(),
            cluster: None,
            service: None,
            strategy: None,
            user: None,
            reason: None,
            error: None,
        }
    }
}

/// Append-only audit sink
pub struct AuditLog {
    file: Mutex<Option<File>>,
    events: Mutex<VecDeque<AuditEvent>>,
    max_events: usize,
}

impl AuditLog {
    /// Open the sink. A file path is optional; when the file cannot be
    /// opened the sink degrades to memory only.
    pub fn new(path: Option<&Path>, max_events: usize) -> Self {
        let file = path.and_then(|path| {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            match OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => {
                    info!("audit logging to {}", path.display());
                    Some(file)
                }
                Err(err) => {
                    warn!("audit log file {} unavailable: {}", path.display(), err);
                    None
                }
            }
        });

        Self {
            file: Mutex::new(file),
            events: Mutex::new(VecDeque::new()),
            max_events: max_events.max(1),
        }
    }

    /// Record an event: one JSON line to the file, one entry in the bounded
    /// queue (FIFO eviction).
    pub fn log(&self, event: AuditEvent) {
        debug!(
            "audit: {:?} | {} | {:?}",
            event.kind, event.deployment_id, event.error
        );

        if let Ok(line) = serde_json::to_string(&event) {
            let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(file) = file.as_mut() {
                if let Err(err) = writeln!(file, "{}", line) {
                    debug!("audit write failed: {}", err);
                }
            }
        }

        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// The most recent `limit` events, oldest first
    pub fn recent(&self, limit: usize) -> Vec<AuditEvent> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        let skip = events.len().saturating_sub(limit);
        events.iter().skip(skip).cloned().collect()
    }

    pub fn deployment_started(&self, request: &DeploymentRequest) {
        let mut event = AuditEvent::new(AuditEventKind::DeploymentStarted, &request.deployment_id);
        event.cluster = Some(request.cluster.clone());
        event.service = Some(request.service.clone());
        event.strategy = Some(request.strategy.clone());
        self.log(event);
    }

    pub fn deployment_finished(
        &self,
        request: &DeploymentRequest,
        phase: DeploymentPhase,
        error: Option<&OrchestratorError>,
    ) {
        let kind = match phase {
            DeploymentPhase::Success => AuditEventKind::DeploymentCompleted,
            DeploymentPhase::Cancelled => AuditEventKind::DeploymentCancelled,
            _ => AuditEventKind::DeploymentFailed,
        };
        let mut event = AuditEvent::new(kind, &request.deployment_id);
        event.cluster = Some(request.cluster.clone());
        event.service = Some(request.service.clone());
        event.strategy = Some(request.strategy.clone());
        event.error = error.map(|err| err.to_string());
        self.log(event);
    }

    pub fn approval_requested(&self, request: &DeploymentRequest) {
        let mut event = AuditEvent::new(AuditEventKind::ApprovalRequested, &request.deployment_id);
        event.cluster = Some(request.cluster.clone());
        event.service = Some(request.service.clone());
        event.strategy = Some(request.strategy.clone());
        self.log(event);
    }

    pub fn approval_decided(&self, deployment_id: &str, approved: bool, approver: &str, reason: &str) {
        let kind = if approved {
            AuditEventKind::ApprovalGranted
        } else {
            AuditEventKind::ApprovalRejected
        };
        let mut event = AuditEvent::new(kind, deployment_id);
        event.user = Some(approver.to_string());
        event.reason = Some(reason.to_string());
        self.log(event);
    }

    pub fn rollback(&self, deployment_id: &str, cluster: &str, service: &str) {
        let mut event = AuditEvent::new(AuditEventKind::DeploymentRollback, deployment_id);
        event.cluster = Some(cluster.to_string());
        event.service = Some(service.to_string());
        self.log(event);
    }
}
