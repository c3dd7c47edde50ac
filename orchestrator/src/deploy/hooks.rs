//! Pre- and post-deploy hooks
//!
//! Hook lists are ordered; hooks within a phase run sequentially. Any hook
//! error fails the deployment.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::OrchestratorError;

pub type HookFuture = Pin<Box<dyn Future<Output = Result<(), OrchestratorError>> + Send>>;
pub type HookFn = Arc<dyn Fn(HookContext) -> HookFuture + Send + Sync>;

/// Fields a hook sees about the deployment it runs for
#[derive(Debug, Clone)]
pub struct HookContext {
    pub deployment_id: String,
    pub cluster: String,
    pub service: String,
}

/// A named deployment hook
#[derive(Clone)]
pub struct Hook {
    pub name: String,
    run: HookFn,
}

impl Hook {
    pub fn new(name: impl Into<String>, run: HookFn) -> Self {
        Self {
            name: name.into(),
            run,
        }
    }
}

/// Ordered hook lists for both deployment phases
#[derive(Default)]
pub struct HookRegistry {
    pre_deploy: Vec<Hook>,
    post_deploy: Vec<Hook>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in hooks installed
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_pre_deploy(Hook::new("validation", Arc::new(validation_hook)));
        registry.register_post_deploy(Hook::new("health-check", Arc::new(health_check_hook)));
        registry.register_post_deploy(Hook::new("notification", Arc::new(notification_hook)));
        registry
    }

    pub fn register_pre_deploy(&mut self, hook: Hook) {
        self.pre_deploy.push(hook);
    }

    pub fn register_post_deploy(&mut self, hook: Hook) {
        self.post_deploy.push(hook);
    }

    pub async fn run_pre_deploy(&self, ctx: &HookContext) -> Result<(), OrchestratorError> {
        debug!("running {} pre-deploy hooks", self.pre_deploy.len());
        Self::run_all(&self.pre_deploy, ctx).await
    }

    pub async fn run_post_deploy(&self, ctx: &HookContext) -> Result<(), OrchestratorError> {
        debug!("running {} post-deploy hooks", self.post_deploy.len());
        Self::run_all(&self.post_deploy, ctx).await
    }

    async fn run_all(hooks: &[Hook], ctx: &HookContext) -> Result<(), OrchestratorError> {
        for hook in hooks {
            info!("running hook: {}", hook.name);
            (hook.run)(ctx.clone())
                .await
                .map_err(|err| OrchestratorError::Hook {
                    name: hook.name.clone(),
                    message: err.to_string(),
                })?;
        }
        Ok(())
    }
}

fn validation_hook(ctx: HookContext) -> HookFuture {
    Box::pin(async move {
        debug!("validating deployment: {}", ctx.deployment_id);
        if ctx.deployment_id.is_empty() || ctx.cluster.is_empty() || ctx.service.is_empty() {
            return Err(OrchestratorError::Validation(
                "invalid deployment parameters".to_string(),
            ));
        }
        Ok(())
    })
}

fn health_check_hook(ctx: HookContext) -> HookFuture {
    Box::pin(async move {
        info!(
            "health check passed for deployment {} ({})",
            ctx.deployment_id, ctx.service
        );
        Ok(())
    })
}

fn notification_hook(ctx: HookContext) -> HookFuture {
    Box::pin(async move {
        info!("notifying watchers of deployment {}", ctx.deployment_id);
        Ok(())
    })
}
