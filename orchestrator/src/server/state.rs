//! Server state

use std::sync::Arc;

use crate::audit::AuditLog;
use crate::deploy::executor::DeployExecutor;
use crate::metrics::MetricsRecorder;
use crate::router::Router;

/// Server state shared across handlers
pub struct ServerState {
    pub router: Router,
    pub audit: Arc<AuditLog>,
    pub metrics: Arc<MetricsRecorder>,
    /// Detached executor for ad-hoc operations (drift checks)
    pub drift_executor: Arc<DeployExecutor>,
}

impl ServerState {
    pub fn new(
        router: Router,
        audit: Arc<AuditLog>,
        metrics: Arc<MetricsRecorder>,
        drift_executor: Arc<DeployExecutor>,
    ) -> Self {
        Self {
            router,
            audit,
            metrics,
            drift_executor,
        }
    }
}
