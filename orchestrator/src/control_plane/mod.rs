//! Control-plane facade
//!
//! The orchestrator drives an external container-service control plane
//! through this narrow surface. All operations are idempotent under retry
//! within a single deployment attempt.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::OrchestratorError;

/// Rollout phase reported for a service's main task set
pub const ROLLOUT_PRIMARY: &str = "PRIMARY";

/// Rollout state reported once a deployment has fully converged
pub const ROLLOUT_COMPLETED: &str = "COMPLETED";

/// One in-flight or settled rollout of a service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloutView {
    pub phase: String,
    pub rollout_state: String,
    pub running: u32,
    pub desired: u32,
}

/// Point-in-time view of a service as reported by the control plane
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceView {
    pub task_definition: String,
    pub desired: u32,
    pub running: u32,
    pub deployments: Vec<RolloutView>,
}

impl ServiceView {
    /// Stability: exactly one rollout, marked primary and completed, with
    /// running counts matching desired at both rollout and service level.
    pub fn is_stable(&self) -> bool {
        if self.deployments.len() != 1 {
            return false;
        }
        let rollout = &self.deployments[0];
        rollout.phase == ROLLOUT_PRIMARY
            && rollout.rollout_state == ROLLOUT_COMPLETED
            && rollout.running == rollout.desired
            && self.running == self.desired
    }
}

/// Callable surface of the container-service control plane
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Register a task definition; accepts a reference or a structured
    /// payload, which the control plane interprets
    async fn register_task_definition(&self, payload: &str) -> Result<(), OrchestratorError>;

    /// Point the service at a task definition, forcing a new deployment
    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        task_definition: &str,
    ) -> Result<(), OrchestratorError>;

    /// Create a weighted task set alongside the service's current one
    async fn create_task_set(
        &self,
        cluster: &str,
        service: &str,
        task_definition: &str,
        weight: u32,
    ) -> Result<(), OrchestratorError>;

    /// Force-delete a task set
    async fn delete_task_set(
        &self,
        cluster: &str,
        service: &str,
        task_set_id: &str,
    ) -> Result<(), OrchestratorError>;

    /// Describe the service's current state
    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<ServiceView, OrchestratorError>;

    /// Task definition of the second-most-recent deployment; errors when the
    /// service has fewer than two
    async fn previous_task_definition(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<String, OrchestratorError>;

    /// Route `new_weight`% of traffic to the new task set and `old_weight`%
    /// to the old one; the control plane resolves the concrete target groups
    async fn shift_traffic(
        &self,
        cluster: &str,
        service: &str,
        new_weight: u32,
        old_weight: u32,
    ) -> Result<(), OrchestratorError>;
}
