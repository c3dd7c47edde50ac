//! In-memory control plane
//!
//! A deterministic facade used when the orchestrator runs in mock mode and
//! by the test suite. Services are seeded up front; every call is recorded
//! in a journal, and failures can be scripted per operation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use tracing::debug;

use crate::control_plane::{ControlPlane, RolloutView, ServiceView, ROLLOUT_COMPLETED, ROLLOUT_PRIMARY};
use crate::errors::OrchestratorError;

/// One recorded facade invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacadeCall {
    RegisterTaskDefinition {
        payload: String,
    },
    UpdateService {
        cluster: String,
        service: String,
        task_definition: String,
    },
    CreateTaskSet {
        cluster: String,
        service: String,
        task_definition: String,
        weight: u32,
    },
    DeleteTaskSet {
        cluster: String,
        service: String,
        task_set_id: String,
    },
    DescribeService {
        cluster: String,
        service: String,
    },
    PreviousTaskDefinition {
        cluster: String,
        service: String,
    },
    ShiftTraffic {
        cluster: String,
        service: String,
        new_weight: u32,
        old_weight: u32,
    },
}

#[derive(Debug, Clone)]
struct TaskSetRecord {
    id: String,
    task_definition: String,
    weight: u32,
    primary: bool,
}

#[derive(Debug, Clone)]
struct ServiceRecord {
    desired: u32,
    running: u32,
    rollout_state: String,
    /// Task definition history, newest last
    history: Vec<String>,
    task_sets: Vec<TaskSetRecord>,
    weights: (u32, u32),
}

/// In-memory implementation of the control-plane facade
#[derive(Default)]
pub struct InMemoryControlPlane {
    services: RwLock<HashMap<String, ServiceRecord>>,
    registered: RwLock<Vec<String>>,
    journal: Mutex<Vec<FacadeCall>>,
    failures: Mutex<HashMap<String, (u32, String)>>,
    task_set_seq: AtomicU32,
}

fn service_key(cluster: &str, service: &str) -> String {
    format!("{}/{}", cluster, service)
}

impl InMemoryControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a service with a task-definition history (newest last) and a
    /// desired count. The service starts stable with a primary task set.
    pub fn seed_service(&self, cluster: &str, service: &str, history: &[&str], desired: u32) {
        let current = history.last().map(|s| s.to_string()).unwrap_or_default();
        let record = ServiceRecord {
            desired,
            running: desired,
            rollout_state: ROLLOUT_COMPLETED.to_string(),
            history: history.iter().map(|s| s.to_string()).collect(),
            task_sets: vec![TaskSetRecord {
                id: "PRIMARY".to_string(),
                task_definition: current,
                weight: 100,
                primary: true,
            }],
            weights: (0, 100),
        };

        let mut services = self.services.write().unwrap_or_else(|e| e.into_inner());
        services.insert(service_key(cluster, service), record);
    }

    /// Script the next `times` invocations of `op` to fail with `message`
    pub fn fail_next(&self, op: &str, times: u32, message: &str) {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        failures.insert(op.to_string(), (times, message.to_string()));
    }

    /// Override the rollout state the service reports on describe
    pub fn set_rollout_state(&self, cluster: &str, service: &str, state: &str) {
        let mut services = self.services.write().unwrap_or_else(|e| e.into_inner());
        if let Some(record) = services.get_mut(&service_key(cluster, service)) {
            record.rollout_state = state.to_string();
        }
    }

    /// Override the running count the service reports on describe
    pub fn set_running(&self, cluster: &str, service: &str, running: u32) {
        let mut services = self.services.write().unwrap_or_else(|e| e.into_inner());
        if let Some(record) = services.get_mut(&service_key(cluster, service)) {
            record.running = running;
        }
    }

    /// All recorded calls, in order
    pub fn calls(&self) -> Vec<FacadeCall> {
        self.journal.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Drop the recorded calls
    pub fn clear_journal(&self) {
        self.journal.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Current traffic weights (new, old) for a service
    pub fn traffic_weights(&self, cluster: &str, service: &str) -> Option<(u32, u32)> {
        let services = self.services.read().unwrap_or_else(|e| e.into_inner());
        services.get(&service_key(cluster, service)).map(|r| r.weights)
    }

    /// Record the call, then fail it if a scripted failure is pending
    fn begin(&self, op: &str, call: FacadeCall) -> Result<(), OrchestratorError> {
        debug!("control plane call: {:?}", call);
        self.journal.lock().unwrap_or_else(|e| e.into_inner()).push(call);

        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((remaining, message)) = failures.get_mut(op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(OrchestratorError::ControlPlane(message.clone()));
            }
        }
        Ok(())
    }

    fn with_service<T>(
        &self,
        cluster: &str,
        service: &str,
        apply: impl FnOnce(&mut ServiceRecord) -> T,
    ) -> Result<T, OrchestratorError> {
        let mut services = self.services.write().unwrap_or_else(|e| e.into_inner());
        match services.get_mut(&service_key(cluster, service)) {
            Some(record) => Ok(apply(record)),
            None => Err(OrchestratorError::NotFound(format!(
                "service {} in cluster {}",
                service, cluster
            ))),
        }
    }
}

#[async_trait]
impl ControlPlane for InMemoryControlPlane {
    async fn register_task_definition(&self, payload: &str) -> Result<(), OrchestratorError> {
        self.begin(
            "register_task_definition",
            FacadeCall::RegisterTaskDefinition {
                payload: payload.to_string(),
            },
        )?;

        let mut registered = self.registered.write().unwrap_or_else(|e| e.into_inner());
        registered.push(payload.to_string());
        Ok(())
    }

    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        task_definition: &str,
    ) -> Result<(), OrchestratorError> {
        self.begin(
            "update_service",
            FacadeCall::UpdateService {
                cluster: cluster.to_string(),
                service: service.to_string(),
                task_definition: task_definition.to_string(),
            },
        )?;

        self.with_service(cluster, service, |record| {
            record.history.push(task_definition.to_string());
            if let Some(primary) = record.task_sets.iter_mut().find(|ts| ts.primary) {
                primary.task_definition = task_definition.to_string();
            }
        })
    }

    async fn create_task_set(
        &self,
        cluster: &str,
        service: &str,
        task_definition: &str,
        weight: u32,
    ) -> Result<(), OrchestratorError> {
        self.begin(
            "create_task_set",
            FacadeCall::CreateTaskSet {
                cluster: cluster.to_string(),
                service: service.to_string(),
                task_definition: task_definition.to_string(),
                weight,
            },
        )?;

        let id = format!("taskset-{}", self.task_set_seq.fetch_add(1, Ordering::SeqCst));
        self.with_service(cluster, service, |record| {
            record.task_sets.push(TaskSetRecord {
                id,
                task_definition: task_definition.to_string(),
                weight,
                primary: false,
            });
        })
    }

    async fn delete_task_set(
        &self,
        cluster: &str,
        service: &str,
        task_set_id: &str,
    ) -> Result<(), OrchestratorError> {
        self.begin(
            "delete_task_set",
            FacadeCall::DeleteTaskSet {
                cluster: cluster.to_string(),
                service: service.to_string(),
                task_set_id: task_set_id.to_string(),
            },
        )?;

        let missing = OrchestratorError::NotFound(format!("task set {}", task_set_id));
        self.with_service(cluster, service, |record| {
            // Symbolic ids resolve the way callers use them: PRIMARY is the
            // current primary set, CANARY/GREEN the newest side set.
            let position = match task_set_id {
                "PRIMARY" => record.task_sets.iter().position(|ts| ts.primary),
                "CANARY" | "GREEN" => record.task_sets.iter().rposition(|ts| !ts.primary),
                id => record.task_sets.iter().position(|ts| ts.id == id),
            };
            match position {
                Some(index) => {
                    record.task_sets.remove(index);
                    Ok(())
                }
                None => Err(missing),
            }
        })?
    }

    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<ServiceView, OrchestratorError> {
        self.begin(
            "describe_service",
            FacadeCall::DescribeService {
                cluster: cluster.to_string(),
                service: service.to_string(),
            },
        )?;

        self.with_service(cluster, service, |record| ServiceView {
            task_definition: record.history.last().cloned().unwrap_or_default(),
            desired: record.desired,
            running: record.running,
            deployments: vec![RolloutView {
                phase: ROLLOUT_PRIMARY.to_string(),
                rollout_state: record.rollout_state.clone(),
                running: record.running,
                desired: record.desired,
            }],
        })
    }

    async fn previous_task_definition(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<String, OrchestratorError> {
        self.begin(
            "previous_task_definition",
            FacadeCall::PreviousTaskDefinition {
                cluster: cluster.to_string(),
                service: service.to_string(),
            },
        )?;

        self.with_service(cluster, service, |record| {
            if record.history.len() < 2 {
                return Err(OrchestratorError::NotFound(
                    "previous deployment".to_string(),
                ));
            }
            Ok(record.history[record.history.len() - 2].clone())
        })?
    }

    async fn shift_traffic(
        &self,
        cluster: &str,
        service: &str,
        new_weight: u32,
        old_weight: u32,
    ) -> Result<(), OrchestratorError> {
        self.begin(
            "shift_traffic",
            FacadeCall::ShiftTraffic {
                cluster: cluster.to_string(),
                service: service.to_string(),
                new_weight,
                old_weight,
            },
        )?;

        self.with_service(cluster, service, |record| {
            record.weights = (new_weight, old_weight);
        })
    }
}
