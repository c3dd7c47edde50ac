//! Router integration tests
//!
//! Drive the router end-to-end against the in-memory control plane.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use conductor::audit::AuditLog;
use conductor::control_plane::memory::{FacadeCall, InMemoryControlPlane};
use conductor::deploy::executor::StabilitySettings;
use conductor::deploy::hooks::HookRegistry;
use conductor::errors::OrchestratorError;
use conductor::metrics::MetricsRecorder;
use conductor::models::deployment::{DeploymentPhase, DeploymentRequest, DeploymentStatus};
use conductor::registry::StrategyRegistry;
use conductor::retry::RetryPolicy;
use conductor::router::{Router, RouterOptions};

fn test_options() -> RouterOptions {
    RouterOptions {
        overall_timeout: Duration::from_secs(600),
        approval_timeout: Duration::from_secs(1800),
        approval_poll_interval: Duration::from_millis(50),
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
        },
        stability: StabilitySettings {
            poll_interval: Duration::from_millis(20),
            health_check_timeout: Duration::from_millis(200),
            default_wait_timeout: Duration::from_millis(400),
        },
    }
}

fn build_router(cp: Arc<InMemoryControlPlane>) -> Router {
    Router::new(
        cp,
        Arc::new(StrategyRegistry::with_defaults()),
        Arc::new(HookRegistry::with_defaults()),
        Arc::new(AuditLog::new(None, 100)),
        Arc::new(MetricsRecorder::new()),
        test_options(),
    )
}

fn request(id: &str, cluster: &str, service: &str, strategy: &str) -> DeploymentRequest {
    DeploymentRequest {
        deployment_id: id.to_string(),
        cluster: cluster.to_string(),
        service: service.to_string(),
        task_definition: "td-v2".to_string(),
        strategy: strategy.to_string(),
        config: HashMap::new(),
    }
}

fn with_config(mut req: DeploymentRequest, pairs: &[(&str, &str)]) -> DeploymentRequest {
    for (key, value) in pairs {
        req.config.insert(key.to_string(), value.to_string());
    }
    req
}

async fn wait_terminal(router: &Router, deployment_id: &str) -> DeploymentStatus {
    for _ in 0..10_000 {
        if let Some(status) = router.status(deployment_id) {
            if status.phase.is_terminal() {
                return status;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("deployment {} never reached a terminal phase", deployment_id);
}

#[tokio::test(start_paused = true)]
async fn quicksync_happy_path() {
    let cp = Arc::new(InMemoryControlPlane::new());
    cp.seed_service("c", "s", &["td-v1"], 2);
    let router = build_router(cp.clone());

    let ack = router.submit(request("d1", "c", "s", "quicksync")).unwrap();
    assert!(ack.success);
    assert_eq!(ack.message, "deployment initiated");
    assert_eq!(ack.deployment_id, "d1");

    let status = wait_terminal(&router, "d1").await;
    assert_eq!(status.phase, DeploymentPhase::Success);
    assert_eq!(status.progress, 100);
    assert!(status.ended_at.is_some());

    let calls = cp.calls();
    assert_eq!(
        calls,
        vec![
            FacadeCall::RegisterTaskDefinition {
                payload: "td-v2".to_string()
            },
            FacadeCall::UpdateService {
                cluster: "c".to_string(),
                service: "s".to_string(),
                task_definition: "td-v2".to_string()
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn concurrent_deployments_to_one_service_are_rejected() {
    let cp = Arc::new(InMemoryControlPlane::new());
    cp.seed_service("c", "s", &["td-v1"], 2);
    let router = build_router(cp);

    let ack = router.submit(request("d3", "c", "s", "quicksync")).unwrap();
    assert!(ack.success);

    let err = router.submit(request("d4", "c", "s", "quicksync")).unwrap_err();
    assert!(matches!(err, OrchestratorError::ConcurrentDeployment));
    assert_eq!(
        err.to_string(),
        "deployment already in progress for this service"
    );
    // The rejected submission never creates a status record
    assert!(router.status("d4").is_none());

    // Once d3 terminates, the service admits a new deployment
    wait_terminal(&router, "d3").await;
    let ack = router.submit(request("d5", "c", "s", "quicksync")).unwrap();
    assert!(ack.success);
    wait_terminal(&router, "d5").await;
}

#[tokio::test(start_paused = true)]
async fn duplicate_deployment_id_is_rejected_while_active() {
    let cp = Arc::new(InMemoryControlPlane::new());
    cp.seed_service("c", "s1", &["td-v1"], 2);
    cp.seed_service("c", "s2", &["td-v1"], 2);
    let router = build_router(cp);

    let slow = with_config(
        request("d6", "c", "s1", "canary"),
        &[("stage_timeout", "60s")],
    );
    router.submit(slow).unwrap();

    // Same id against a different service: the id, not the lease, rejects it
    let err = router.submit(request("d6", "c", "s2", "quicksync")).unwrap_err();
    assert!(matches!(err, OrchestratorError::Validation(_)));
    assert_eq!(router.status("d6").unwrap().phase, DeploymentPhase::Running);

    router.cancel("d6").unwrap();
    wait_terminal(&router, "d6").await;
}

#[tokio::test(start_paused = true)]
async fn validation_rejects_incomplete_requests() {
    let cp = Arc::new(InMemoryControlPlane::new());
    let router = build_router(cp);

    let mut empty_task_def = request("d1", "c", "s", "quicksync");
    empty_task_def.task_definition = String::new();
    assert!(matches!(
        router.submit(empty_task_def),
        Err(OrchestratorError::Validation(_))
    ));

    assert!(matches!(
        router.submit(request("d1", "c", "s", "big-bang")),
        Err(OrchestratorError::UnknownStrategy(_))
    ));

    // Rejected submissions leave no state behind
    assert!(router.status("d1").is_none());
}

#[tokio::test(start_paused = true)]
async fn rejected_approval_fails_without_facade_calls() {
    let cp = Arc::new(InMemoryControlPlane::new());
    cp.seed_service("c", "s", &["td-v1"], 2);
    let router = build_router(cp.clone());

    let gated = with_config(
        request("d7", "c", "s", "quicksync"),
        &[("require_approval", "true")],
    );
    router.submit(gated).unwrap();
    assert_eq!(
        router.status("d7").unwrap().phase,
        DeploymentPhase::PendingApproval
    );

    router.approve("d7", false, "x", "not this week").unwrap();

    let status = wait_terminal(&router, "d7").await;
    assert_eq!(status.phase, DeploymentPhase::Failed);
    assert!(status.message.contains("rejected"));
    assert!(cp.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn approved_deployment_proceeds_to_success() {
    let cp = Arc::new(InMemoryControlPlane::new());
    cp.seed_service("c", "s", &["td-v1"], 2);
    let router = build_router(cp.clone());

    let gated = with_config(
        request("d8", "c", "s", "quicksync"),
        &[("require_approval", "true")],
    );
    router.submit(gated).unwrap();
    router.approve("d8", true, "alice", "lgtm").unwrap();

    let status = wait_terminal(&router, "d8").await;
    assert_eq!(status.phase, DeploymentPhase::Success);
    assert_eq!(cp.calls().len(), 2);

    // Deciding a settled approval is rejected
    let err = router.approve("d8", false, "bob", "too late").unwrap_err();
    assert!(matches!(err, OrchestratorError::AlreadyDecided(_)));
}

#[tokio::test(start_paused = true)]
async fn cancellation_rolls_back_a_mid_stage_canary() {
    let cp = Arc::new(InMemoryControlPlane::new());
    cp.seed_service("c", "s", &["td-v1"], 2);
    let router = build_router(cp.clone());

    let slow = with_config(
        request("d9", "c", "s", "canary"),
        &[("canary_stages", "10,100"), ("stage_timeout", "60s")],
    );
    router.submit(slow).unwrap();

    // Let the worker reach the first stage wait, then cancel
    tokio::time::sleep(Duration::from_millis(50)).await;
    router.cancel("d9").unwrap();

    let status = wait_terminal(&router, "d9").await;
    assert_eq!(status.phase, DeploymentPhase::Cancelled);

    let calls = cp.calls();
    assert!(calls.contains(&FacadeCall::ShiftTraffic {
        cluster: "c".to_string(),
        service: "s".to_string(),
        new_weight: 0,
        old_weight: 100,
    }));
    assert!(calls.contains(&FacadeCall::DeleteTaskSet {
        cluster: "c".to_string(),
        service: "s".to_string(),
        task_set_id: "CANARY".to_string(),
    }));

    // The handle is gone once the deployment is terminal
    let err = router.cancel("d9").unwrap_err();
    assert!(matches!(err, OrchestratorError::Validation(_)));
}

#[tokio::test(start_paused = true)]
async fn status_outlives_the_deployment() {
    let cp = Arc::new(InMemoryControlPlane::new());
    cp.seed_service("c", "s", &["td-v1"], 2);
    let router = build_router(cp);

    router.submit(request("d10", "c", "s", "quicksync")).unwrap();
    wait_terminal(&router, "d10").await;

    // Long after completion, the record is still queryable
    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(
        router.status("d10").unwrap().phase,
        DeploymentPhase::Success
    );
    assert!(router.status("ghost").is_none());
}

#[tokio::test(start_paused = true)]
async fn rollback_restores_the_previous_task_definition() {
    let cp = Arc::new(InMemoryControlPlane::new());
    cp.seed_service("c", "s", &["td-v1", "td-v2"], 2);
    let router = build_router(cp.clone());

    router.rollback("d11", "c", "s").await.unwrap();

    let calls = cp.calls();
    assert_eq!(
        calls.last().unwrap(),
        &FacadeCall::UpdateService {
            cluster: "c".to_string(),
            service: "s".to_string(),
            task_definition: "td-v1".to_string(),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn list_strategies_reflects_the_registry() {
    let cp = Arc::new(InMemoryControlPlane::new());
    let router = build_router(cp);
    assert_eq!(
        router.list_strategies(),
        vec!["quicksync", "canary", "bluegreen", "rolling"]
    );
}
