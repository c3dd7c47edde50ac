//! Rolling: shift traffic to the new version in fixed-size batches

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::errors::OrchestratorError;
use crate::strategies::{config, phase_error, DeploymentContext, Strategy};

pub struct Rolling;

impl Rolling {
    /// Best-effort rollback: all traffic back to the old version, then the
    /// service back to the snapshotted task definition when one exists.
    async fn rollback(&self, ctx: &DeploymentContext, previous: Option<&str>) {
        warn!("rolling back rolling deployment {}", ctx.deployment_id);
        let executor = ctx.executor.for_rollback();

        if let Err(err) = executor
            .shift_traffic(&ctx.cluster, &ctx.service, 0, 100)
            .await
        {
            error!("rollback traffic shift failed: {}", err);
        }

        match previous {
            Some(task_definition) => {
                if let Err(err) = executor
                    .update_service(&ctx.cluster, &ctx.service, task_definition)
                    .await
                {
                    error!("rollback service update failed: {}", err);
                }
            }
            None => warn!("no previous task definition snapshot, skipping service restore"),
        }

        info!("rolling rollback finished for {}", ctx.deployment_id);
    }
}

#[async_trait]
impl Strategy for Rolling {
    fn name(&self) -> &'static str {
        "rolling"
    }

    async fn execute(&self, ctx: &DeploymentContext) -> Result<(), OrchestratorError> {
        let batch_size = config::batch_size(&ctx.config);
        let batch_delay =
            config::duration_option(&ctx.config, "batch_delay", Duration::from_secs(60));
        let rollback_enabled = config::rollback_enabled(&ctx.config);

        info!(
            "starting rolling deployment for {} (batch size: {}%, delay: {:?})",
            ctx.service, batch_size, batch_delay
        );

        let previous = match ctx
            .executor
            .previous_task_definition(&ctx.cluster, &ctx.service)
            .await
        {
            Ok(task_definition) => Some(task_definition),
            Err(err) => {
                warn!("could not snapshot previous task definition: {}", err);
                None
            }
        };

        ctx.executor
            .register_task_definition(&ctx.task_definition)
            .await
            .map_err(|err| phase_error("register task definition", err))?;
        ctx.progress.report(10, "task definition registered");

        let total_batches = 100_u32.div_ceil(batch_size);
        info!("executing {} batches", total_batches);

        for batch in 1..=total_batches {
            if ctx.cancel.is_cancelled() {
                if rollback_enabled {
                    self.rollback(ctx, previous.as_deref()).await;
                }
                return Err(OrchestratorError::Cancelled);
            }

            let weight = (batch * batch_size).min(100);
            info!(
                "batch {}/{}: shifting to {}% new version",
                batch, total_batches, weight
            );

            if let Err(err) = ctx
                .executor
                .shift_traffic(&ctx.cluster, &ctx.service, weight, 100 - weight)
                .await
            {
                if rollback_enabled {
                    self.rollback(ctx, previous.as_deref()).await;
                }
                return Err(phase_error(&format!("batch {} traffic shift", batch), err));
            }

            info!("waiting {:?} for batch {} to stabilize", batch_delay, batch);
            tokio::select! {
                _ = tokio::time::sleep(batch_delay) => {}
                _ = ctx.cancel.cancelled() => {
                    if rollback_enabled {
                        self.rollback(ctx, previous.as_deref()).await;
                    }
                    return Err(OrchestratorError::Cancelled);
                }
            }

            if let Err(err) = ctx
                .executor
                .describe_service(&ctx.cluster, &ctx.service)
                .await
            {
                if rollback_enabled {
                    self.rollback(ctx, previous.as_deref()).await;
                }
                return Err(phase_error(&format!("batch {} health check", batch), err));
            }

            let progress = 10 + (70 * batch / total_batches) as u8;
            ctx.progress
                .report(progress, &format!("batch {}/{} completed", batch, total_batches));
            info!("batch {} completed", batch);
        }

        info!("finalizing rolling deployment");
        if let Err(err) = ctx
            .executor
            .update_service(&ctx.cluster, &ctx.service, &ctx.task_definition)
            .await
        {
            if rollback_enabled {
                self.rollback(ctx, previous.as_deref()).await;
            }
            return Err(phase_error("finalize service update", err));
        }
        ctx.progress.report(90, "service updated to new version");

        // Final convergence is advisory; the traffic is already fully
        // shifted and the service update has been accepted.
        if let Err(err) = ctx
            .executor
            .wait_for_stable(&ctx.cluster, &ctx.service, None)
            .await
        {
            warn!("service did not stabilize after finalization: {}", err);
        }

        info!("rolling deployment completed for {}", ctx.service);
        Ok(())
    }
}
