//! Deployment router
//!
//! The engine's front door: validates requests, enforces per-service mutual
//! exclusion, spawns one worker per admitted deployment, and exposes
//! status, cancel, approve, and rollback operations. Admission is
//! synchronous; everything after the ACK is surfaced through the status
//! record.

pub mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::audit::AuditLog;
use crate::control_plane::ControlPlane;
use crate::deploy::approval::{ApprovalManager, ApprovalRecord};
use crate::deploy::executor::{DeployExecutor, StabilitySettings};
use crate::deploy::hooks::{HookContext, HookRegistry};
use crate::errors::OrchestratorError;
use crate::metrics::MetricsRecorder;
use crate::models::deployment::{
    DeploymentAck, DeploymentPhase, DeploymentRequest, DeploymentStatus,
};
use crate::registry::StrategyRegistry;
use crate::retry::RetryPolicy;
use crate::router::state::{CancelRegistry, ServiceLeases, StatusBoard};
use crate::strategies::{DeploymentContext, ProgressHandle};

/// Router tuning knobs
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Bound on a whole deployment; firing it cancels the worker
    pub overall_timeout: Duration,

    /// Bound on an approval wait
    pub approval_timeout: Duration,

    /// Interval between approval polls
    pub approval_poll_interval: Duration,

    /// Retry policy for facade calls
    pub retry: RetryPolicy,

    /// Stability polling settings
    pub stability: StabilitySettings,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            overall_timeout: Duration::from_secs(600),
            approval_timeout: Duration::from_secs(1800),
            approval_poll_interval: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            stability: StabilitySettings::default(),
        }
    }
}

/// Deployment router and worker owner
#[derive(Clone)]
pub struct Router {
    control_plane: Arc<dyn ControlPlane>,
    registry: Arc<StrategyRegistry>,
    hooks: Arc<HookRegistry>,
    approvals: Arc<ApprovalManager>,
    statuses: Arc<StatusBoard>,
    leases: Arc<ServiceLeases>,
    cancels: Arc<CancelRegistry>,
    audit: Arc<AuditLog>,
    metrics: Arc<MetricsRecorder>,
    options: RouterOptions,
}

impl Router {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        registry: Arc<StrategyRegistry>,
        hooks: Arc<HookRegistry>,
        audit: Arc<AuditLog>,
        metrics: Arc<MetricsRecorder>,
        options: RouterOptions,
    ) -> Self {
        Self {
            control_plane,
            registry,
            hooks,
            approvals: Arc::new(ApprovalManager::new()),
            statuses: Arc::new(StatusBoard::new()),
            leases: Arc::new(ServiceLeases::new()),
            cancels: Arc::new(CancelRegistry::new()),
            audit,
            metrics,
            options,
        }
    }

    /// Validate a request against its fields and the current registry
    fn validate(&self, request: &DeploymentRequest) -> Result<(), OrchestratorError> {
        if request.deployment_id.is_empty() {
            return Err(OrchestratorError::Validation(
                "deployment_id is required".to_string(),
            ));
        }
        if request.cluster.is_empty() {
            return Err(OrchestratorError::Validation(
                "cluster is required".to_string(),
            ));
        }
        if request.service.is_empty() {
            return Err(OrchestratorError::Validation(
                "service is required".to_string(),
            ));
        }
        if request.task_definition.is_empty() {
            return Err(OrchestratorError::Validation(
                "task_definition is required".to_string(),
            ));
        }
        if request.strategy.is_empty() {
            return Err(OrchestratorError::Validation(
                "strategy is required".to_string(),
            ));
        }
        if !self.registry.contains(&request.strategy) {
            return Err(OrchestratorError::UnknownStrategy(request.strategy.clone()));
        }
        if self.statuses.is_active(&request.deployment_id) {
            return Err(OrchestratorError::Validation(format!(
                "deployment {} is already active",
                request.deployment_id
            )));
        }
        Ok(())
    }

    /// Admit a deployment and hand it to a background worker.
    ///
    /// Never blocks on strategy execution; once the ACK is returned, all
    /// further outcomes are reported through the status record.
    pub fn submit(&self, request: DeploymentRequest) -> Result<DeploymentAck, OrchestratorError> {
        self.validate(&request)?;

        if !self
            .leases
            .claim(&request.cluster, &request.service, &request.deployment_id)
        {
            return Err(OrchestratorError::ConcurrentDeployment);
        }

        let require_approval = request.requires_approval();
        let (phase, message) = if require_approval {
            (DeploymentPhase::PendingApproval, "awaiting approval")
        } else {
            (DeploymentPhase::Running, "deployment started")
        };
        self.statuses.insert(
            &request.deployment_id,
            DeploymentStatus::admitted(phase, message, &request.strategy),
        );

        if require_approval {
            self.approvals.request(
                &request.deployment_id,
                &request.cluster,
                &request.service,
                &request.strategy,
            );
            self.audit.approval_requested(&request);
        }

        let cancel = CancellationToken::new();
        self.cancels.insert(&request.deployment_id, cancel.clone());

        self.metrics.deployment_started();
        self.audit.deployment_started(&request);

        info!(
            "deployment {} admitted (service: {}/{}, strategy: {})",
            request.deployment_id, request.cluster, request.service, request.strategy
        );

        let worker = self.clone();
        let deployment_id = request.deployment_id.clone();
        tokio::spawn(async move {
            worker.run_worker(request, cancel, require_approval).await;
        });

        Ok(DeploymentAck {
            success: true,
            message: "deployment initiated".to_string(),
            deployment_id,
        })
    }

    /// Own one deployment from hand-off to its terminal state
    async fn run_worker(
        self,
        request: DeploymentRequest,
        cancel: CancellationToken,
        require_approval: bool,
    ) {
        let started = Instant::now();
        let deadline = started + self.options.overall_timeout;

        // The outermost timeout triggers cancellation rather than killing
        // the worker, so rollback still gets its chance to run.
        let watchdog = tokio::spawn({
            let cancel = cancel.clone();
            let overall_timeout = self.options.overall_timeout;
            let deployment_id = request.deployment_id.clone();
            async move {
                tokio::time::sleep(overall_timeout).await;
                warn!(
                    "deployment {} exceeded the overall timeout ({:?}), cancelling",
                    deployment_id, overall_timeout
                );
                cancel.cancel();
            }
        });

        let outcome = self
            .drive(&request, &cancel, require_approval, deadline)
            .await;
        watchdog.abort();

        let duration = started.elapsed();
        let phase = match &outcome {
            Ok(()) => {
                self.statuses.finish(
                    &request.deployment_id,
                    DeploymentPhase::Success,
                    "deployment completed",
                );
                DeploymentPhase::Success
            }
            Err(err) if err.is_cancellation() => {
                self.statuses.finish(
                    &request.deployment_id,
                    DeploymentPhase::Cancelled,
                    &err.to_string(),
                );
                DeploymentPhase::Cancelled
            }
            Err(err) => {
                self.statuses.finish(
                    &request.deployment_id,
                    DeploymentPhase::Failed,
                    &err.to_string(),
                );
                DeploymentPhase::Failed
            }
        };

        self.audit
            .deployment_finished(&request, phase, outcome.as_ref().err());
        self.metrics
            .deployment_finished(&request.strategy, phase, duration);

        // Guaranteed release: the lease and the cancellation handle go away
        // on every exit path.
        self.leases.release(&request.cluster, &request.service);
        self.cancels.remove(&request.deployment_id);

        info!(
            "deployment {} finished: {} in {:?}",
            request.deployment_id, phase, duration
        );
    }

    async fn drive(
        &self,
        request: &DeploymentRequest,
        cancel: &CancellationToken,
        require_approval: bool,
        deadline: Instant,
    ) -> Result<(), OrchestratorError> {
        if require_approval {
            self.approvals
                .wait(
                    &request.deployment_id,
                    self.options.approval_timeout,
                    self.options.approval_poll_interval,
                    cancel,
                )
                .await?;
            self.statuses.mark_running(
                &request.deployment_id,
                "approval granted, deployment started",
            );
        }

        let hook_ctx = HookContext {
            deployment_id: request.deployment_id.clone(),
            cluster: request.cluster.clone(),
            service: request.service.clone(),
        };
        self.hooks.run_pre_deploy(&hook_ctx).await?;

        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }

        let strategy = self
            .registry
            .get(&request.strategy)
            .ok_or_else(|| OrchestratorError::UnknownStrategy(request.strategy.clone()))?;

        let executor = Arc::new(DeployExecutor::new(
            self.control_plane.clone(),
            self.options.retry.clone(),
            self.options.stability.clone(),
            cancel.clone(),
            Some(deadline),
        ));
        let progress = ProgressHandle::new(self.statuses.clone(), request.deployment_id.clone());
        let ctx = DeploymentContext::new(request, executor, cancel.clone(), progress);

        strategy.execute(&ctx).await?;

        self.hooks.run_post_deploy(&hook_ctx).await?;
        Ok(())
    }

    /// Status record for a deployment
    pub fn status(&self, deployment_id: &str) -> Option<DeploymentStatus> {
        self.statuses.get(deployment_id)
    }

    /// Approval record for a deployment
    pub fn approval(&self, deployment_id: &str) -> Option<ApprovalRecord> {
        self.approvals.get(deployment_id)
    }

    /// Request cancellation of a non-terminal deployment
    pub fn cancel(&self, deployment_id: &str) -> Result<(), OrchestratorError> {
        let status = self
            .status(deployment_id)
            .ok_or_else(|| OrchestratorError::NotFound(format!("deployment {}", deployment_id)))?;

        if status.phase.is_terminal() {
            return Err(OrchestratorError::Validation(format!(
                "deployment {} is not running (phase: {})",
                deployment_id, status.phase
            )));
        }

        if !self.cancels.cancel(deployment_id) {
            return Err(OrchestratorError::NotFound(format!(
                "cancellation handle for deployment {}",
                deployment_id
            )));
        }

        info!("cancellation requested for deployment {}", deployment_id);
        Ok(())
    }

    /// Decide a pending approval
    pub fn approve(
        &self,
        deployment_id: &str,
        approved: bool,
        approver: &str,
        reason: &str,
    ) -> Result<(), OrchestratorError> {
        if approved {
            self.approvals.approve(deployment_id, approver, reason)?;
        } else {
            self.approvals.reject(deployment_id, approver, reason)?;
        }
        self.audit
            .approval_decided(deployment_id, approved, approver, reason);
        Ok(())
    }

    /// Roll a service back to its previous task definition
    pub async fn rollback(
        &self,
        deployment_id: &str,
        cluster: &str,
        service: &str,
    ) -> Result<(), OrchestratorError> {
        info!(
            "rollback requested for deployment {} ({}/{})",
            deployment_id, cluster, service
        );

        let executor = DeployExecutor::new(
            self.control_plane.clone(),
            self.options.retry.clone(),
            self.options.stability.clone(),
            CancellationToken::new(),
            None,
        );

        let previous = executor.previous_task_definition(cluster, service).await?;
        executor.update_service(cluster, service, &previous).await?;

        self.audit.rollback(deployment_id, cluster, service);
        Ok(())
    }

    /// Registered strategy names
    pub fn list_strategies(&self) -> Vec<String> {
        self.registry.list()
    }

    /// Fire every live cancellation handle (process shutdown)
    pub fn cancel_all(&self) {
        self.cancels.cancel_all();
    }
}
