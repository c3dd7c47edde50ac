//! Settings file management

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::options::{
    AppOptions, AuditOptions, ControlPlaneOptions, LifecycleOptions, ServerOptions,
};
use crate::errors::OrchestratorError;
use crate::logs::LogLevel;
use crate::retry::RetryPolicy;
use crate::router::RouterOptions;

/// Orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[serde(default)]
    pub json_logs: bool,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Control-plane configuration
    #[serde(default)]
    pub control_plane: ControlPlaneSettings,

    /// Deployment configuration
    #[serde(default)]
    pub deployments: DeploymentSettings,

    /// Audit sink configuration
    #[serde(default)]
    pub audit: AuditSettings,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Control-plane settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneSettings {
    /// Base URL for the control-plane API
    #[serde(default = "default_control_plane_url")]
    pub base_url: String,

    /// Use the in-memory control plane
    #[serde(default)]
    pub mock: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_control_plane_url() -> String {
    "http://localhost:9400/control-plane/v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ControlPlaneSettings {
    fn default() -> Self {
        Self {
            base_url: default_control_plane_url(),
            mock: false,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Deployment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentSettings {
    /// Bound on a whole deployment, in seconds
    #[serde(default = "default_overall_timeout_secs")]
    pub overall_timeout_secs: u64,

    /// Bound on an approval wait, in seconds
    #[serde(default = "default_approval_timeout_secs")]
    pub approval_timeout_secs: u64,

    /// Facade retry budget
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
}

fn default_overall_timeout_secs() -> u64 {
    600
}

fn default_approval_timeout_secs() -> u64 {
    1800
}

fn default_retry_max_attempts() -> u32 {
    3
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            overall_timeout_secs: default_overall_timeout_secs(),
            approval_timeout_secs: default_approval_timeout_secs(),
            retry_max_attempts: default_retry_max_attempts(),
        }
    }
}

/// Audit sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSettings {
    /// JSON-lines log file path; empty disables file output
    #[serde(default = "default_audit_log_path")]
    pub log_path: Option<String>,

    /// Bound on the in-memory event queue
    #[serde(default = "default_audit_max_events")]
    pub max_events: usize,
}

fn default_audit_log_path() -> Option<String> {
    Some("/var/log/conductor/audit.log".to_string())
}

fn default_audit_max_events() -> usize {
    crate::audit::DEFAULT_MAX_EVENTS
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            log_path: default_audit_log_path(),
            max_events: default_audit_max_events(),
        }
    }
}

impl Settings {
    /// Read settings from a JSON file
    pub async fn load(path: &Path) -> Result<Self, OrchestratorError> {
        let contents = tokio::fs::read_to_string(path).await?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    /// Map settings onto runtime options
    pub fn into_options(self) -> AppOptions {
        AppOptions {
            lifecycle: LifecycleOptions::default(),
            server: ServerOptions {
                host: self.server.host,
                port: self.server.port,
            },
            control_plane: ControlPlaneOptions {
                base_url: self.control_plane.base_url,
                mock: self.control_plane.mock,
                request_timeout: Duration::from_secs(self.control_plane.request_timeout_secs),
            },
            router: RouterOptions {
                overall_timeout: Duration::from_secs(self.deployments.overall_timeout_secs),
                approval_timeout: Duration::from_secs(self.deployments.approval_timeout_secs),
                retry: RetryPolicy {
                    max_attempts: self.deployments.retry_max_attempts,
                    ..RetryPolicy::default()
                },
                ..RouterOptions::default()
            },
            audit: AuditOptions {
                log_path: self.audit.log_path.filter(|p| !p.is_empty()).map(PathBuf::from),
                max_events: self.audit.max_events,
            },
        }
    }
}
