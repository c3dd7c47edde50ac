//! Blue/green: stand up a green stack beside blue, then cut traffic over

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::errors::OrchestratorError;
use crate::strategies::{config, phase_error, DeploymentContext, Strategy};

pub struct BlueGreen;

impl BlueGreen {
    /// Best-effort rollback: traffic back to blue, drop the green task set
    async fn rollback(&self, ctx: &DeploymentContext) {
        warn!(
            "rolling back blue/green deployment {} to blue",
            ctx.deployment_id
        );
        let executor = ctx.executor.for_rollback();

        if let Err(err) = executor
            .shift_traffic(&ctx.cluster, &ctx.service, 0, 100)
            .await
        {
            error!("rollback traffic shift failed: {}", err);
        }
        if let Err(err) = executor
            .delete_task_set(&ctx.cluster, &ctx.service, "GREEN")
            .await
        {
            error!("rollback task set cleanup failed: {}", err);
        }

        info!("blue/green rollback finished for {}", ctx.deployment_id);
    }
}

#[async_trait]
impl Strategy for BlueGreen {
    fn name(&self) -> &'static str {
        "bluegreen"
    }

    async fn execute(&self, ctx: &DeploymentContext) -> Result<(), OrchestratorError> {
        let stabilization_time =
            config::duration_option(&ctx.config, "stabilization_time", Duration::from_secs(30));
        let cleanup_delay =
            config::duration_option(&ctx.config, "cleanup_delay", Duration::from_secs(60));
        let rollback_enabled = config::rollback_enabled(&ctx.config);

        info!("starting blue/green deployment for {}", ctx.service);

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
        ctx.progress.report(15, "green task definition registered");

        info!("creating green environment");
        ctx.executor
            .create_task_set(&ctx.cluster, &ctx.service, &ctx.task_definition, 100)
            .await
            .map_err(|err| phase_error("create green task set", err))?;
        ctx.progress.report(30, "green environment created");

        let stability_bound = stabilization_time + Duration::from_secs(60);
        if let Err(err) = ctx
            .executor
            .wait_for_stable(&ctx.cluster, &ctx.service, Some(stability_bound))
            .await
        {
            if rollback_enabled {
                self.rollback(ctx).await;
            }
            return Err(phase_error("green stabilization", err));
        }
        ctx.progress.report(60, "green environment is stable");

        info!("shifting traffic to the green environment");
        if let Err(err) = ctx
            .executor
            .shift_traffic(&ctx.cluster, &ctx.service, 100, 0)
            .await
        {
            if rollback_enabled {
                self.rollback(ctx).await;
            }
            return Err(phase_error("traffic cutover", err));
        }
        ctx.progress.report(85, "all traffic on green");

        info!("waiting {:?} before blue cleanup", cleanup_delay);
        // Plain sleep by contract: cancellation must not skip the cleanup
        // pause, or the green stack could be left unreferenced but undeleted.
        tokio::time::sleep(cleanup_delay).await;

        info!("cleaning up blue environment");
        if let Err(err) = ctx
            .executor
            .delete_task_set(&ctx.cluster, &ctx.service, "PRIMARY")
            .await
        {
            warn!("blue cleanup failed: {}", err);
        }
        ctx.progress.report(95, "blue environment cleaned up");

        info!("blue/green deployment completed for {}", ctx.service);
        Ok(())
    }
}
