//! Quicksync: register the new task definition and point the service at it
//!
//! No rollback of its own; the control plane rolls the service internally
//! if the update fails to converge.

use async_trait::async_trait;
use tracing::info;

use crate::errors::OrchestratorError;
use crate::strategies::{phase_error, DeploymentContext, Strategy};

pub struct QuickSync;

#[async_trait]
impl Strategy for QuickSync {
    fn name(&self) -> &'static str {
        "quicksync"
    }

    async fn execute(&self, ctx: &DeploymentContext) -> Result<(), OrchestratorError> {
        info!("starting quicksync deployment for {}", ctx.service);

        ctx.executor
            .register_task_definition(&ctx.task_definition)
            .await
            .map_err(|err| phase_error("register task definition", err))?;
        ctx.progress.report(50, "task definition registered");

        ctx.executor
            .update_service(&ctx.cluster, &ctx.service, &ctx.task_definition)
            .await
            .map_err(|err| phase_error("update service", err))?;
        ctx.progress.report(90, "service updated");

        info!("quicksync deployment completed for {}", ctx.service);
        Ok(())
    }
}
