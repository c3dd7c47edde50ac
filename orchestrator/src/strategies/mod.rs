//! Deployment strategies
//!
//! Each strategy encodes one deployment pattern as a linear sequence of
//! phases with health gates and a rollback entry point. Every blocking wait
//! is a race against the deployment's cancellation token, except where a
//! strategy documents otherwise.

pub mod bluegreen;
pub mod canary;
pub mod config;
pub mod quicksync;
pub mod rolling;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::deploy::executor::DeployExecutor;
use crate::errors::OrchestratorError;
use crate::models::deployment::DeploymentRequest;
use crate::router::state::StatusBoard;

/// Everything a strategy needs to drive one deployment
pub struct DeploymentContext {
    pub deployment_id: String,
    pub cluster: String,
    pub service: String,
    pub task_definition: String,
    pub config: HashMap<String, String>,
    pub executor: Arc<DeployExecutor>,
    pub cancel: CancellationToken,
    pub progress: ProgressHandle,
}

impl DeploymentContext {
    pub fn new(
        request: &DeploymentRequest,
        executor: Arc<DeployExecutor>,
        cancel: CancellationToken,
        progress: ProgressHandle,
    ) -> Self {
        Self {
            deployment_id: request.deployment_id.clone(),
            cluster: request.cluster.clone(),
            service: request.service.clone(),
            task_definition: request.task_definition.clone(),
            config: request.config.clone(),
            executor,
            cancel,
            progress,
        }
    }
}

/// A pluggable deployment pattern
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, ctx: &DeploymentContext) -> Result<(), OrchestratorError>;
}

/// Reports strategy progress into the deployment's status record
#[derive(Clone)]
pub struct ProgressHandle {
    board: Arc<StatusBoard>,
    deployment_id: String,
}

impl ProgressHandle {
    pub fn new(board: Arc<StatusBoard>, deployment_id: impl Into<String>) -> Self {
        Self {
            board,
            deployment_id: deployment_id.into(),
        }
    }

    pub fn report(&self, progress: u8, message: &str) {
        self.board
            .update_progress(&self.deployment_id, progress, message);
    }
}

/// Tag an in-phase error with the phase that produced it. Cancellation
/// passes through untagged so the worker can still classify it.
pub(crate) fn phase_error(phase: &str, err: OrchestratorError) -> OrchestratorError {
    if err.is_cancellation() {
        return err;
    }
    OrchestratorError::PhaseFailure {
        phase: phase.to_string(),
        message: err.to_string(),
    }
}
