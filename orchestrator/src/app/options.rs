//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use crate::router::RouterOptions;

/// Main application options
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// HTTP server configuration
    pub server: ServerOptions,

    /// Control-plane client configuration
    pub control_plane: ControlPlaneOptions,

    /// Router configuration
    pub router: RouterOptions,

    /// Audit sink configuration
    pub audit: AuditOptions,
}

/// Lifecycle options for the orchestrator
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Control-plane client options
#[derive(Debug, Clone)]
pub struct ControlPlaneOptions {
    /// Base URL of the control-plane API
    pub base_url: String,

    /// Use the in-memory control plane instead of the HTTP client
    pub mock: bool,

    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for ControlPlaneOptions {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9400/control-plane/v1".to_string(),
            mock: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Audit sink options
#[derive(Debug, Clone)]
pub struct AuditOptions {
    /// JSON-lines log file; memory-only when absent
    pub log_path: Option<PathBuf>,

    /// Bound on the in-memory event queue
    pub max_events: usize,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            log_path: Some(PathBuf::from("/var/log/conductor/audit.log")),
            max_events: crate::audit::DEFAULT_MAX_EVENTS,
        }
    }
}
