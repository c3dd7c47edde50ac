//! Error types for the conductor orchestrator

use thiserror::Error;

/// Main error type for the orchestrator
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("deployment already in progress for this service")]
    ConcurrentDeployment,

    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("approval timed out: {0}")]
    ApprovalTimeout(String),

    #[error("approval rejected: {0}")]
    ApprovalRejected(String),

    #[error("phase {phase} failed: {message}")]
    PhaseFailure { phase: String, message: String },

    #[error("deployment cancelled")]
    Cancelled,

    #[error("health check failed: {0}")]
    HealthFailure(String),

    #[error("retries exhausted after {attempts} attempts: {message}")]
    RetryExhausted { attempts: u32, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already decided: {0}")]
    AlreadyDecided(String),

    #[error("hook {name} failed: {message}")]
    Hook { name: String, message: String },

    #[error("control plane error: {0}")]
    ControlPlane(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl OrchestratorError {
    /// Whether this error represents cooperative cancellation rather than a
    /// genuine failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, OrchestratorError::Cancelled)
    }
}

impl From<anyhow::Error> for OrchestratorError {
    fn from(err: anyhow::Error) -> Self {
        OrchestratorError::Server(err.to_string())
    }
}
