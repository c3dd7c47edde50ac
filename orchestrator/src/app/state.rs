//! Application state wiring

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app::options::AppOptions;
use crate::audit::AuditLog;
use crate::control_plane::http::HttpControlPlane;
use crate::control_plane::memory::InMemoryControlPlane;
use crate::control_plane::ControlPlane;
use crate::deploy::executor::DeployExecutor;
use crate::deploy::hooks::HookRegistry;
use crate::errors::OrchestratorError;
use crate::metrics::MetricsRecorder;
use crate::registry::StrategyRegistry;
use crate::router::Router;

/// Main application state
pub struct AppState {
    /// Deployment router
    pub router: Router,

    /// Strategy registry
    pub registry: Arc<StrategyRegistry>,

    /// Control-plane facade
    pub control_plane: Arc<dyn ControlPlane>,

    /// Audit sink
    pub audit: Arc<AuditLog>,

    /// Metrics recorder
    pub metrics: Arc<MetricsRecorder>,

    /// Detached executor for ad-hoc operations
    pub drift_executor: Arc<DeployExecutor>,
}

impl AppState {
    /// Initialize application state
    pub fn init(options: &AppOptions) -> Result<Self, OrchestratorError> {
        info!("Initializing orchestrator state...");

        let control_plane: Arc<dyn ControlPlane> = if options.control_plane.mock {
            info!("control plane running in mock mode");
            Arc::new(InMemoryControlPlane::new())
        } else {
            Arc::new(HttpControlPlane::new(
                &options.control_plane.base_url,
                options.control_plane.request_timeout,
            )?)
        };

        let registry = Arc::new(StrategyRegistry::with_defaults());
        let hooks = Arc::new(HookRegistry::with_defaults());
        let audit = Arc::new(AuditLog::new(
            options.audit.log_path.as_deref(),
            options.audit.max_events,
        ));
        let metrics = Arc::new(MetricsRecorder::new());

        let router = Router::new(
            control_plane.clone(),
            registry.clone(),
            hooks,
            audit.clone(),
            metrics.clone(),
            options.router.clone(),
        );

        let drift_executor = Arc::new(DeployExecutor::new(
            control_plane.clone(),
            options.router.retry.clone(),
            options.router.stability.clone(),
            CancellationToken::new(),
            None,
        ));

        Ok(Self {
            router,
            registry,
            control_plane,
            audit,
            metrics,
            drift_executor,
        })
    }
}
