//! Deployment models

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A deployment request submitted by a client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRequest {
    /// Client-supplied unique identifier
    pub deployment_id: String,

    /// Target cluster
    pub cluster: String,

    /// Target service within the cluster
    pub service: String,

    /// Opaque task definition: a reference or a structured payload the
    /// control plane knows how to register
    pub task_definition: String,

    /// Name of the strategy to run
    pub strategy: String,

    /// Strategy-specific options; unknown keys are ignored
    #[serde(default)]
    pub config: HashMap<String, String>,
}

impl DeploymentRequest {
    /// Whether the request asks for a manual approval gate
    pub fn requires_approval(&self) -> bool {
        self.config.get("require_approval").map(String::as_str) == Some("true")
    }
}

/// Result of admission, returned synchronously to the caller
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentAck {
    pub success: bool,
    pub message: String,
    pub deployment_id: String,
}

/// Lifecycle phase of a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentPhase {
    PendingApproval,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl DeploymentPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeploymentPhase::Success | DeploymentPhase::Failed | DeploymentPhase::Cancelled
        )
    }
}

impl fmt::Display for DeploymentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentPhase::PendingApproval => "PENDING_APPROVAL",
            DeploymentPhase::Running => "RUNNING",
            DeploymentPhase::Success => "SUCCESS",
            DeploymentPhase::Failed => "FAILED",
            DeploymentPhase::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

/// Observable state of one deployment
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentStatus {
    pub phase: DeploymentPhase,

    /// Human-readable progress or error text
    pub message: String,

    /// 0..100, non-decreasing; 100 exactly when the phase is terminal
    pub progress: u8,

    pub started_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    pub strategy: String,
}

impl DeploymentStatus {
    /// Fresh status record at admission time
    pub fn admitted(phase: DeploymentPhase, message: &str, strategy: &str) -> Self {
        Self {
            phase,
            message: message.to_string(),
            progress: 0,
            started_at: Utc::now(),
            ended_at: None,
            strategy: strategy.to_string(),
        }
    }
}
