//! Canary: staged weighted task sets with per-stage health gates

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::errors::OrchestratorError;
use crate::strategies::{config, phase_error, DeploymentContext, Strategy};

pub struct Canary;

impl Canary {
    /// Best-effort rollback: all traffic back to the old version, then drop
    /// the canary task set. Runs on a detached executor so it still works
    /// after cancellation.
    async fn rollback(&self, ctx: &DeploymentContext) {
        warn!("rolling back canary deployment {}", ctx.deployment_id);
        let executor = ctx.executor.for_rollback();

        if let Err(err) = executor
            .shift_traffic(&ctx.cluster, &ctx.service, 0, 100)
            .await
        {
            error!("rollback traffic shift failed: {}", err);
        }
        if let Err(err) = executor
            .delete_task_set(&ctx.cluster, &ctx.service, "CANARY")
            .await
        {
            error!("rollback task set cleanup failed: {}", err);
        }

        info!("canary rollback finished for {}", ctx.deployment_id);
    }
}

#[async_trait]
impl Strategy for Canary {
    fn name(&self) -> &'static str {
        "canary"
    }

    async fn execute(&self, ctx: &DeploymentContext) -> Result<(), OrchestratorError> {
        let stages = config::canary_stages(&ctx.config);
        let stage_timeout = config::duration_option(
            &ctx.config,
            "stage_timeout",
            std::time::Duration::from_secs(120),
        );
        let rollback_enabled = config::rollback_enabled(&ctx.config);

        info!(
            "starting canary deployment for {} with stages {:?} (rollback: {})",
            ctx.service, stages, rollback_enabled
        );

        // Snapshot failure is tolerated; canary rollback only touches
        // traffic and the canary task set.
        if let Err(err) = ctx
            .executor
            .previous_task_definition(&ctx.cluster, &ctx.service)
            .await
        {
            warn!("could not snapshot previous task definition: {}", err);
        }

        ctx.executor
            .register_task_definition(&ctx.task_definition)
            .await
            .map_err(|err| phase_error("register task definition", err))?;
        ctx.progress.report(10, "task definition registered");

        let total = stages.len();
        for (index, weight) in stages.iter().copied().enumerate() {
            let stage = format!("{}%", weight);
            info!("canary stage {}/{}: {}", index + 1, total, stage);

            if let Err(err) = ctx
                .executor
                .create_task_set(&ctx.cluster, &ctx.service, &ctx.task_definition, weight)
                .await
            {
                if rollback_enabled {
                    self.rollback(ctx).await;
                }
                return Err(phase_error(&format!("stage {}", stage), err));
            }

            info!("waiting {:?} for stage {} to stabilize", stage_timeout, stage);
            tokio::select! {
                _ = tokio::time::sleep(stage_timeout) => {}
                _ = ctx.cancel.cancelled() => {
                    if rollback_enabled {
                        self.rollback(ctx).await;
                    }
                    return Err(OrchestratorError::Cancelled);
                }
            }

            let health_bound = ctx.executor.stability().health_check_timeout;
            if let Err(err) = ctx
                .executor
                .wait_for_stable(&ctx.cluster, &ctx.service, Some(health_bound))
                .await
            {
                if rollback_enabled {
                    self.rollback(ctx).await;
                }
                return Err(phase_error(&format!("stage {} health check", stage), err));
            }

            let progress = 10 + (80 * (index + 1) / total) as u8;
            ctx.progress
                .report(progress, &format!("stage {} completed", stage));
            info!("canary stage {} completed", stage);
        }

        info!("shifting all traffic to the new version");
        if let Err(err) = ctx
            .executor
            .shift_traffic(&ctx.cluster, &ctx.service, 100, 0)
            .await
        {
            if rollback_enabled {
                self.rollback(ctx).await;
            }
            return Err(phase_error("final traffic shift", err));
        }
        ctx.progress.report(95, "all traffic on new version");

        // The new version is already primary; a failed cleanup is reported
        // but does not fail the deployment.
        if let Err(err) = ctx
            .executor
            .delete_task_set(&ctx.cluster, &ctx.service, "PRIMARY")
            .await
        {
            warn!("old task set cleanup failed: {}", err);
        }

        info!("canary deployment completed for {}", ctx.service);
        Ok(())
    }
}
