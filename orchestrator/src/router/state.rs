//! Router bookkeeping: status map, service leases, cancellation handles
//!
//! Three independent maps, each behind its own lock; workers only touch the
//! entries they own.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::models::deployment::{DeploymentPhase, DeploymentStatus};

/// Observable deployment state, one record per deployment id
#[derive(Default)]
pub struct StatusBoard {
    statuses: RwLock<HashMap<String, DeploymentStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, deployment_id: &str, status: DeploymentStatus) {
        let mut statuses = self.statuses.write().unwrap_or_else(|e| e.into_inner());
        statuses.insert(deployment_id.to_string(), status);
    }

    pub fn get(&self, deployment_id: &str) -> Option<DeploymentStatus> {
        let statuses = self.statuses.read().unwrap_or_else(|e| e.into_inner());
        statuses.get(deployment_id).cloned()
    }

    /// Whether a record exists and has not reached a terminal phase
    pub fn is_active(&self, deployment_id: &str) -> bool {
        let statuses = self.statuses.read().unwrap_or_else(|e| e.into_inner());
        statuses
            .get(deployment_id)
            .map(|status| !status.phase.is_terminal())
            .unwrap_or(false)
    }

    /// Record intermediate progress. Progress is monotone and stays below
    /// 100 until a terminal transition reports it.
    pub fn update_progress(&self, deployment_id: &str, progress: u8, message: &str) {
        let mut statuses = self.statuses.write().unwrap_or_else(|e| e.into_inner());
        if let Some(status) = statuses.get_mut(deployment_id) {
            if status.phase.is_terminal() {
                return;
            }
            status.progress = status.progress.max(progress.min(99));
            status.message = message.to_string();
        }
    }

    /// Move a pending-approval deployment into the running phase
    pub fn mark_running(&self, deployment_id: &str, message: &str) {
        let mut statuses = self.statuses.write().unwrap_or_else(|e| e.into_inner());
        if let Some(status) = statuses.get_mut(deployment_id) {
            if status.phase == DeploymentPhase::PendingApproval {
                status.phase = DeploymentPhase::Running;
                status.message = message.to_string();
            }
        }
    }

    /// Record a terminal phase. Terminal records never change again.
    pub fn finish(&self, deployment_id: &str, phase: DeploymentPhase, message: &str) {
        debug_assert!(phase.is_terminal());
        let mut statuses = self.statuses.write().unwrap_or_else(|e| e.into_inner());
        if let Some(status) = statuses.get_mut(deployment_id) {
            if status.phase.is_terminal() {
                return;
            }
            status.phase = phase;
            status.message = message.to_string();
            status.progress = 100;
            status.ended_at = Some(Utc::now());
        }
    }
}

/// Exclusive per-service deployment leases
#[derive(Default)]
pub struct ServiceLeases {
    leases: RwLock<HashMap<String, String>>,
}

fn lease_key(cluster: &str, service: &str) -> String {
    format!("{}/{}", cluster, service)
}

impl ServiceLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the lease for a service; false when it is already held
    pub fn claim(&self, cluster: &str, service: &str, deployment_id: &str) -> bool {
        let mut leases = self.leases.write().unwrap_or_else(|e| e.into_inner());
        let key = lease_key(cluster, service);
        if leases.contains_key(&key) {
            return false;
        }
        leases.insert(key, deployment_id.to_string());
        true
    }

    pub fn release(&self, cluster: &str, service: &str) {
        let mut leases = self.leases.write().unwrap_or_else(|e| e.into_inner());
        leases.remove(&lease_key(cluster, service));
    }

    /// Deployment currently holding the lease, if any
    pub fn holder(&self, cluster: &str, service: &str) -> Option<String> {
        let leases = self.leases.read().unwrap_or_else(|e| e.into_inner());
        leases.get(&lease_key(cluster, service)).cloned()
    }
}

/// Live cancellation handles for non-terminal deployments
#[derive(Default)]
pub struct CancelRegistry {
    tokens: RwLock<HashMap<String, CancellationToken>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, deployment_id: &str, token: CancellationToken) {
        let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        tokens.insert(deployment_id.to_string(), token);
    }

    pub fn remove(&self, deployment_id: &str) -> Option<CancellationToken> {
        let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        tokens.remove(deployment_id)
    }

    /// Fire a deployment's cancellation handle; false when none is held
    pub fn cancel(&self, deployment_id: &str) -> bool {
        let tokens = self.tokens.read().unwrap_or_else(|e| e.into_inner());
        match tokens.get(deployment_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Fire every live handle (process shutdown)
    pub fn cancel_all(&self) {
        let tokens = self.tokens.read().unwrap_or_else(|e| e.into_inner());
        for token in tokens.values() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_status() -> DeploymentStatus {
        DeploymentStatus::admitted(DeploymentPhase::Running, "deployment started", "canary")
    }

    #[test]
    fn progress_is_monotone_and_capped_below_terminal() {
        let board = StatusBoard::new();
        board.insert("d1", running_status());

        board.update_progress("d1", 40, "stage one");
        board.update_progress("d1", 20, "stale update");
        assert_eq!(board.get("d1").unwrap().progress, 40);

        board.update_progress("d1", 100, "overeager");
        assert_eq!(board.get("d1").unwrap().progress, 99);
    }

    #[test]
    fn terminal_records_are_immutable() {
        let board = StatusBoard::new();
        board.insert("d1", running_status());
        board.finish("d1", DeploymentPhase::Failed, "phase stage 10% failed");

        board.finish("d1", DeploymentPhase::Success, "too late");
        board.update_progress("d1", 10, "too late");

        let status = board.get("d1").unwrap();
        assert_eq!(status.phase, DeploymentPhase::Failed);
        assert_eq!(status.progress, 100);
        assert!(status.ended_at.is_some());
        assert_eq!(status.message, "phase stage 10% failed");
    }

    #[test]
    fn lease_is_exclusive_until_released() {
        let leases = ServiceLeases::new();
        assert!(leases.claim("c", "s", "d1"));
        assert!(!leases.claim("c", "s", "d2"));
        assert_eq!(leases.holder("c", "s").as_deref(), Some("d1"));

        leases.release("c", "s");
        assert!(leases.claim("c", "s", "d2"));
    }

    #[test]
    fn cancel_registry_fires_and_releases_handles() {
        let registry = CancelRegistry::new();
        let token = CancellationToken::new();
        registry.insert("d1", token.clone());

        assert!(registry.cancel("d1"));
        assert!(token.is_cancelled());

        registry.remove("d1");
        assert!(!registry.cancel("d1"));
    }
}
