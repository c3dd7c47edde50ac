//! Strategy integration tests
//!
//! Execute each strategy directly against the in-memory control plane and
//! assert on the exact facade call sequences.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use conductor::control_plane::memory::{FacadeCall, InMemoryControlPlane};
use conductor::deploy::executor::{DeployExecutor, StabilitySettings};
use conductor::errors::OrchestratorError;
use conductor::models::deployment::{DeploymentPhase, DeploymentRequest, DeploymentStatus};
use conductor::retry::RetryPolicy;
use conductor::router::state::StatusBoard;
use conductor::strategies::bluegreen::BlueGreen;
use conductor::strategies::canary::Canary;
use conductor::strategies::quicksync::QuickSync;
use conductor::strategies::rolling::Rolling;
use conductor::strategies::{DeploymentContext, ProgressHandle, Strategy};

fn request(config: &[(&str, &str)]) -> DeploymentRequest {
    DeploymentRequest {
        deployment_id: "d1".to_string(),
        cluster: "c".to_string(),
        service: "s".to_string(),
        task_definition: "td-v2".to_string(),
        strategy: String::new(),
        config: config
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

fn context(cp: Arc<InMemoryControlPlane>, config: &[(&str, &str)]) -> DeploymentContext {
    let request = request(config);
    let cancel = CancellationToken::new();
    let executor = Arc::new(DeployExecutor::new(
        cp,
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
        },
        StabilitySettings {
            poll_interval: Duration::from_millis(20),
            health_check_timeout: Duration::from_millis(200),
            default_wait_timeout: Duration::from_millis(400),
        },
        cancel.clone(),
        None,
    ));

    let board = Arc::new(StatusBoard::new());
    board.insert(
        "d1",
        DeploymentStatus::admitted(DeploymentPhase::Running, "deployment started", "test"),
    );
    let progress = ProgressHandle::new(board, "d1");

    DeploymentContext::new(&request, executor, cancel, progress)
}

fn op_name(call: &FacadeCall) -> &'static str {
    match call {
        FacadeCall::RegisterTaskDefinition { .. } => "register",
        FacadeCall::UpdateService { .. } => "update_service",
        FacadeCall::CreateTaskSet { .. } => "create_task_set",
        FacadeCall::DeleteTaskSet { .. } => "delete_task_set",
        FacadeCall::DescribeService { .. } => "describe",
        FacadeCall::PreviousTaskDefinition { .. } => "previous",
        FacadeCall::ShiftTraffic { .. } => "shift_traffic",
    }
}

#[tokio::test(start_paused = true)]
async fn canary_rolls_back_when_a_stage_never_stabilizes() {
    let cp = Arc::new(InMemoryControlPlane::new());
    cp.seed_service("c", "s", &["td-v1"], 2);
    cp.set_rollout_state("c", "s", "IN_PROGRESS");

    let ctx = context(
        cp.clone(),
        &[("canary_stages", "10,50,100"), ("stage_timeout", "1s")],
    );
    let err = Canary.execute(&ctx).await.unwrap_err();

    // The failure names the stage that died
    match &err {
        OrchestratorError::PhaseFailure { phase, .. } => assert!(phase.contains("10%")),
        other => panic!("expected PhaseFailure, got {:?}", other),
    }

    let calls = cp.calls();
    // Only the first stage's task set was ever created
    let creates: Vec<_> = calls
        .iter()
        .filter(|call| matches!(call, FacadeCall::CreateTaskSet { .. }))
        .collect();
    assert_eq!(
        creates,
        vec![&FacadeCall::CreateTaskSet {
            cluster: "c".to_string(),
            service: "s".to_string(),
            task_definition: "td-v2".to_string(),
            weight: 10,
        }]
    );

    // Rollback shifted traffic back and dropped the canary task set
    let names: Vec<_> = calls.iter().map(op_name).collect();
    let shift_back = calls
        .iter()
        .position(|call| {
            matches!(
                call,
                FacadeCall::ShiftTraffic {
                    new_weight: 0,
                    old_weight: 100,
                    ..
                }
            )
        })
        .expect("rollback traffic shift missing");
    assert_eq!(names.last(), Some(&"delete_task_set"));
    assert_eq!(
        calls.last().unwrap(),
        &FacadeCall::DeleteTaskSet {
            cluster: "c".to_string(),
            service: "s".to_string(),
            task_set_id: "CANARY".to_string(),
        }
    );
    assert!(shift_back < calls.len() - 1);
}

#[tokio::test(start_paused = true)]
async fn canary_respects_disabled_rollback() {
    let cp = Arc::new(InMemoryControlPlane::new());
    cp.seed_service("c", "s", &["td-v1"], 2);
    cp.set_rollout_state("c", "s", "IN_PROGRESS");

    let ctx = context(
        cp.clone(),
        &[
            ("canary_stages", "10,100"),
            ("stage_timeout", "1s"),
            ("enable_rollback", "false"),
        ],
    );
    assert!(Canary.execute(&ctx).await.is_err());

    let calls = cp.calls();
    assert!(!calls
        .iter()
        .any(|call| matches!(call, FacadeCall::ShiftTraffic { .. })));
    assert!(!calls
        .iter()
        .any(|call| matches!(call, FacadeCall::DeleteTaskSet { .. })));
}

#[tokio::test(start_paused = true)]
async fn canary_finishes_with_full_shift_and_cleanup() {
    let cp = Arc::new(InMemoryControlPlane::new());
    cp.seed_service("c", "s", &["td-v0", "td-v1"], 2);

    let ctx = context(
        cp.clone(),
        &[("canary_stages", "25,100"), ("stage_timeout", "1s")],
    );
    Canary.execute(&ctx).await.unwrap();

    let calls = cp.calls();
    let shift = calls
        .iter()
        .find(|call| matches!(call, FacadeCall::ShiftTraffic { .. }))
        .unwrap();
    assert_eq!(
        shift,
        &FacadeCall::ShiftTraffic {
            cluster: "c".to_string(),
            service: "s".to_string(),
            new_weight: 100,
            old_weight: 0,
        }
    );
    assert_eq!(
        calls.last().unwrap(),
        &FacadeCall::DeleteTaskSet {
            cluster: "c".to_string(),
            service: "s".to_string(),
            task_set_id: "PRIMARY".to_string(),
        }
    );
    assert_eq!(cp.traffic_weights("c", "s"), Some((100, 0)));
}

#[tokio::test(start_paused = true)]
async fn bluegreen_full_cycle() {
    let cp = Arc::new(InMemoryControlPlane::new());
    cp.seed_service("c", "s", &["td-v0", "td-v1"], 2);

    let ctx = context(
        cp.clone(),
        &[("stabilization_time", "100ms"), ("cleanup_delay", "1s")],
    );
    BlueGreen.execute(&ctx).await.unwrap();

    let calls = cp.calls();
    let names: Vec<_> = calls.iter().map(op_name).collect();

    // Register, green task set at full weight, stability polls, cutover,
    // then blue cleanup
    assert_eq!(names[0], "previous");
    assert_eq!(names[1], "register");
    assert_eq!(
        calls[2],
        FacadeCall::CreateTaskSet {
            cluster: "c".to_string(),
            service: "s".to_string(),
            task_definition: "td-v2".to_string(),
            weight: 100,
        }
    );
    assert!(names.contains(&"describe"));

    let shift = calls
        .iter()
        .position(|call| {
            matches!(
                call,
                FacadeCall::ShiftTraffic {
                    new_weight: 100,
                    old_weight: 0,
                    ..
                }
            )
        })
        .expect("traffic cutover missing");
    assert_eq!(
        calls.last().unwrap(),
        &FacadeCall::DeleteTaskSet {
            cluster: "c".to_string(),
            service: "s".to_string(),
            task_set_id: "PRIMARY".to_string(),
        }
    );
    assert!(shift < calls.len() - 1);
}

#[tokio::test(start_paused = true)]
async fn bluegreen_rolls_back_when_green_never_stabilizes() {
    let cp = Arc::new(InMemoryControlPlane::new());
    cp.seed_service("c", "s", &["td-v1"], 2);
    cp.set_rollout_state("c", "s", "IN_PROGRESS");

    let ctx = context(cp.clone(), &[("stabilization_time", "100ms")]);
    let err = BlueGreen.execute(&ctx).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::PhaseFailure { .. }));

    let calls = cp.calls();
    assert!(calls.contains(&FacadeCall::ShiftTraffic {
        cluster: "c".to_string(),
        service: "s".to_string(),
        new_weight: 0,
        old_weight: 100,
    }));
    assert_eq!(
        calls.last().unwrap(),
        &FacadeCall::DeleteTaskSet {
            cluster: "c".to_string(),
            service: "s".to_string(),
            task_set_id: "GREEN".to_string(),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn rolling_shifts_in_batches_and_finalizes() {
    let cp = Arc::new(InMemoryControlPlane::new());
    cp.seed_service("c", "s", &["td-v0", "td-v1"], 2);

    let ctx = context(cp.clone(), &[("batch_size", "50"), ("batch_delay", "10ms")]);
    Rolling.execute(&ctx).await.unwrap();

    let calls = cp.calls();
    let shifts: Vec<_> = calls
        .iter()
        .filter_map(|call| match call {
            FacadeCall::ShiftTraffic {
                new_weight,
                old_weight,
                ..
            } => Some((*new_weight, *old_weight)),
            _ => None,
        })
        .collect();
    assert_eq!(shifts, vec![(50, 50), (100, 0)]);

    assert!(calls.contains(&FacadeCall::UpdateService {
        cluster: "c".to_string(),
        service: "s".to_string(),
        task_definition: "td-v2".to_string(),
    }));
}

#[tokio::test(start_paused = true)]
async fn rolling_with_full_batch_size_collapses_to_one_batch() {
    let cp = Arc::new(InMemoryControlPlane::new());
    cp.seed_service("c", "s", &["td-v0", "td-v1"], 2);

    let ctx = context(cp.clone(), &[("batch_size", "100"), ("batch_delay", "10ms")]);
    Rolling.execute(&ctx).await.unwrap();

    let shifts: Vec<_> = cp
        .calls()
        .iter()
        .filter(|call| matches!(call, FacadeCall::ShiftTraffic { .. }))
        .cloned()
        .collect();
    assert_eq!(
        shifts,
        vec![FacadeCall::ShiftTraffic {
            cluster: "c".to_string(),
            service: "s".to_string(),
            new_weight: 100,
            old_weight: 0,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn rolling_rollback_restores_the_snapshot() {
    let cp = Arc::new(InMemoryControlPlane::new());
    cp.seed_service("c", "s", &["td-v0", "td-v1"], 2);
    cp.fail_next("shift_traffic", 1, "listener misconfigured");

    let ctx = context(cp.clone(), &[("batch_size", "50"), ("batch_delay", "10ms")]);
    let err = Rolling.execute(&ctx).await.unwrap_err();
    match &err {
        OrchestratorError::PhaseFailure { phase, .. } => assert!(phase.contains("batch 1")),
        other => panic!("expected PhaseFailure, got {:?}", other),
    }

    let calls = cp.calls();
    // Rollback: traffic back to the old version, then the snapshotted
    // task definition restored
    assert!(calls.contains(&FacadeCall::ShiftTraffic {
        cluster: "c".to_string(),
        service: "s".to_string(),
        new_weight: 0,
        old_weight: 100,
    }));
    assert_eq!(
        calls.last().unwrap(),
        &FacadeCall::UpdateService {
            cluster: "c".to_string(),
            service: "s".to_string(),
            task_definition: "td-v0".to_string(),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn retry_budget_is_exhausted_with_expected_backoff() {
    let cp = Arc::new(InMemoryControlPlane::new());
    cp.fail_next("register_task_definition", 3, "Throttling: rate exceeded");

    let executor = DeployExecutor::new(
        cp.clone(),
        RetryPolicy::default(),
        StabilitySettings::default(),
        CancellationToken::new(),
        None,
    );

    let start = Instant::now();
    let err = executor.register_task_definition("td-v2").await.unwrap_err();

    match err {
        OrchestratorError::RetryExhausted { attempts, message } => {
            assert_eq!(attempts, 3);
            assert!(message.contains("Throttling"));
        }
        other => panic!("expected RetryExhausted, got {:?}", other),
    }
    // Three invocations, with 1s and 2s waits between them
    assert_eq!(cp.calls().len(), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn quicksync_stops_after_register_exhausts_retries() {
    let cp = Arc::new(InMemoryControlPlane::new());
    cp.seed_service("c", "s", &["td-v1"], 2);
    cp.fail_next("register_task_definition", 3, "Throttling: rate exceeded");

    let ctx = context(cp.clone(), &[]);
    let err = QuickSync.execute(&ctx).await.unwrap_err();
    match &err {
        OrchestratorError::PhaseFailure { phase, .. } => {
            assert_eq!(phase, "register task definition")
        }
        other => panic!("expected PhaseFailure, got {:?}", other),
    }

    // No facade calls after the failed registration
    let calls = cp.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls
        .iter()
        .all(|call| matches!(call, FacadeCall::RegisterTaskDefinition { .. })));
}

#[tokio::test(start_paused = true)]
async fn snapshot_failure_does_not_fail_the_strategy() {
    let cp = Arc::new(InMemoryControlPlane::new());
    // Single-entry history: no previous deployment to snapshot
    cp.seed_service("c", "s", &["td-v1"], 2);

    let ctx = context(cp.clone(), &[("batch_size", "100"), ("batch_delay", "10ms")]);
    Rolling.execute(&ctx).await.unwrap();
}
