//! In-process deployment metrics
//!
//! Counters and gauges the worker loop feeds on every terminal transition.
//! The snapshot is served by the telemetry endpoint; exporting to an
//! external system is a collaborator concern.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use serde::Serialize;

use crate::models::deployment::DeploymentPhase;

#[derive(Default)]
pub struct MetricsRecorder {
    in_progress: AtomicI64,
    outcomes: RwLock<HashMap<String, u64>>,
    durations_ms: RwLock<HashMap<String, u64>>,
}

/// Point-in-time view of the recorded metrics
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub in_progress: i64,
    /// Terminal deployments by "strategy/phase"
    pub completed: HashMap<String, u64>,
    /// Cumulative wall-clock per "strategy/phase", in milliseconds
    pub total_duration_ms: HashMap<String, u64>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deployment_started(&self) {
        self.in_progress.fetch_add(1, Ordering::SeqCst);
    }

    pub fn deployment_finished(&self, strategy: &str, phase: DeploymentPhase, duration: Duration) {
        self.in_progress.fetch_sub(1, Ordering::SeqCst);

        let key = format!("{}/{}", strategy, phase);

        let mut outcomes = self.outcomes.write().unwrap_or_else(|e| e.into_inner());
        *outcomes.entry(key.clone()).or_insert(0) += 1;
        drop(outcomes);

        let mut durations = self.durations_ms.write().unwrap_or_else(|e| e.into_inner());
        *durations.entry(key).or_insert(0) += duration.as_millis() as u64;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            in_progress: self.in_progress.load(Ordering::SeqCst),
            completed: self
                .outcomes
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
            total_duration_ms: self
                .durations_ms
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_in_progress_and_outcomes() {
        let metrics = MetricsRecorder::new();

        metrics.deployment_started();
        metrics.deployment_started();
        assert_eq!(metrics.snapshot().in_progress, 2);

        metrics.deployment_finished("canary", DeploymentPhase::Success, Duration::from_secs(2));
        metrics.deployment_finished("canary", DeploymentPhase::Failed, Duration::from_secs(1));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.in_progress, 0);
        assert_eq!(snapshot.completed["canary/SUCCESS"], 1);
        assert_eq!(snapshot.completed["canary/FAILED"], 1);
        assert_eq!(snapshot.total_duration_ms["canary/SUCCESS"], 2000);
    }
}
