//! Control-plane executor shared by all strategies
//!
//! Wraps the facade so that every call runs under the retry harness, races
//! the deployment's cancellation token, and respects the overall deadline.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::control_plane::{ControlPlane, ServiceView};
use crate::errors::OrchestratorError;
use crate::retry::{self, RetryPolicy};

/// Settings for service stability polling
#[derive(Debug, Clone)]
pub struct StabilitySettings {
    /// Interval between describe-service polls
    pub poll_interval: Duration,

    /// Bound on a per-stage health validation
    pub health_check_timeout: Duration,

    /// Bound on a stability wait when the caller gives none
    pub default_wait_timeout: Duration,
}

impl Default for StabilitySettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            health_check_timeout: Duration::from_secs(120),
            default_wait_timeout: Duration::from_secs(300),
        }
    }
}

/// Per-deployment facade wrapper
pub struct DeployExecutor {
    control_plane: Arc<dyn ControlPlane>,
    retry: RetryPolicy,
    stability: StabilitySettings,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl DeployExecutor {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        retry: RetryPolicy,
        stability: StabilitySettings,
        cancel: CancellationToken,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            control_plane,
            retry,
            stability,
            cancel,
            deadline,
        }
    }

    /// A detached clone for rollback work: fresh cancellation token, no
    /// deadline. Rollback driven through the already-cancelled token would
    /// abort before reaching the control plane.
    pub fn for_rollback(&self) -> Self {
        Self {
            control_plane: self.control_plane.clone(),
            retry: self.retry.clone(),
            stability: self.stability.clone(),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn stability(&self) -> &StabilitySettings {
        &self.stability
    }

    /// Run a facade call under retry, racing the cancellation token
    async fn guarded<T, F, Fut>(&self, op: F) -> Result<T, OrchestratorError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, OrchestratorError>>,
    {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(OrchestratorError::Cancelled),
            result = retry::with_backoff(&self.retry, self.deadline, &self.cancel, op) => result,
        }
    }

    pub async fn register_task_definition(&self, payload: &str) -> Result<(), OrchestratorError> {
        self.guarded(|| self.control_plane.register_task_definition(payload))
            .await
    }

    pub async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        task_definition: &str,
    ) -> Result<(), OrchestratorError> {
        self.guarded(|| self.control_plane.update_service(cluster, service, task_definition))
            .await
    }

    pub async fn create_task_set(
        &self,
        cluster: &str,
        service: &str,
        task_definition: &str,
        weight: u32,
    ) -> Result<(), OrchestratorError> {
        self.guarded(|| {
            self.control_plane
                .create_task_set(cluster, service, task_definition, weight)
        })
        .await
    }

    /// Delete a task set. A set that is already gone is not an error.
    pub async fn delete_task_set(
        &self,
        cluster: &str,
        service: &str,
        task_set_id: &str,
    ) -> Result<(), OrchestratorError> {
        match self
            .guarded(|| self.control_plane.delete_task_set(cluster, service, task_set_id))
            .await
        {
            Err(OrchestratorError::NotFound(message)) => {
                debug!("task set already gone: {}", message);
                Ok(())
            }
            other => other,
        }
    }

    pub async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<ServiceView, OrchestratorError> {
        self.guarded(|| self.control_plane.describe_service(cluster, service))
            .await
    }

    pub async fn previous_task_definition(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<String, OrchestratorError> {
        self.guarded(|| self.control_plane.previous_task_definition(cluster, service))
            .await
    }

    /// Shift traffic between the new and old task sets. Weights must sum
    /// to 100.
    pub async fn shift_traffic(
        &self,
        cluster: &str,
        service: &str,
        new_weight: u32,
        old_weight: u32,
    ) -> Result<(), OrchestratorError> {
        if new_weight + old_weight != 100 {
            return Err(OrchestratorError::Validation(format!(
                "traffic weights must sum to 100, got {} + {}",
                new_weight, old_weight
            )));
        }

        self.guarded(|| {
            self.control_plane
                .shift_traffic(cluster, service, new_weight, old_weight)
        })
        .await
    }

    /// Poll the service until it reports stable, bounded by `timeout`
    /// (default wait timeout when `None`).
    pub async fn wait_for_stable(
        &self,
        cluster: &str,
        service: &str,
        timeout: Option<Duration>,
    ) -> Result<(), OrchestratorError> {
        let timeout = timeout.unwrap_or(self.stability.default_wait_timeout);
        let deadline = Instant::now() + timeout;

        info!(
            "waiting for service {} to stabilize (timeout: {:?})",
            service, timeout
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(OrchestratorError::Cancelled),
                _ = tokio::time::sleep(self.stability.poll_interval) => {}
            }

            if Instant::now() >= deadline {
                return Err(OrchestratorError::HealthFailure(format!(
                    "service {} did not stabilize within {:?}",
                    service, timeout
                )));
            }

            let view = match self.control_plane.describe_service(cluster, service).await {
                Ok(view) => view,
                Err(err) => {
                    debug!("describe failed while waiting for stability: {}", err);
                    continue;
                }
            };

            if view.is_stable() {
                info!(
                    "service {} is stable: {}/{} tasks running",
                    service, view.running, view.desired
                );
                return Ok(());
            }

            debug!(
                "service {} not yet stable: running={}/{}",
                service, view.running, view.desired
            );
        }
    }
}
