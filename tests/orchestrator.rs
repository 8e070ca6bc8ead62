//! End-to-end tests of the task engine with a scripted scan engine.

use async_trait::async_trait;
use rocketscan::config::ServerConfig;
use rocketscan::error::{ScanError, TaskError};
use rocketscan::orchestrator::{Orchestrator, OrchestratorSettings, ScanExecutor};
use rocketscan::render::FormatRenderer;
use rocketscan::scanner::{PortResult, PortStatus, ScanEngine, ScanOptions};
use rocketscan::storage::{connect_storage, MemoryStorage, Storage, TaskStore};
use rocketscan::task::{ScanRequest, TaskStatus, PROGRESS_DONE};
use rocketscan::types::{Port, TaskId};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

const FAILING_TARGET: &str = "fail.invalid";

/// Scans block until the test hands out a permit on `gate`.
struct GatedEngine {
    gate: Semaphore,
    started: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl Default for GatedEngine {
    fn default() -> Self {
        Self {
            gate: Semaphore::new(0),
            started: AtomicUsize::default(),
            in_flight: AtomicUsize::default(),
            peak: AtomicUsize::default(),
        }
    }
}

impl GatedEngine {
    fn release(&self, scans: usize) {
        self.gate.add_permits(scans);
    }

    fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScanEngine for GatedEngine {
    async fn scan(&self, options: &ScanOptions) -> Result<Vec<PortResult>, ScanError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let acquired = self.gate.acquire().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        acquired
            .map_err(|_| ScanError::ConnectionFailed("gate closed".to_string()))?
            .forget();

        if options.target == FAILING_TARGET {
            return Err(ScanError::HostUnreachable);
        }
        Ok(vec![PortResult::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            Port::new(22).unwrap(),
            PortStatus::Open,
            "ssh",
        )])
    }
}

struct Harness {
    engine: Arc<GatedEngine>,
    orchestrator: Arc<Orchestrator>,
}

fn harness(max_concurrency: usize, queue_size: usize, grace: Duration) -> Harness {
    harness_on(Arc::new(MemoryStorage::new()), max_concurrency, queue_size, grace)
}

fn harness_on(
    backend: Arc<dyn Storage>,
    max_concurrency: usize,
    queue_size: usize,
    grace: Duration,
) -> Harness {
    let engine = Arc::new(GatedEngine::default());
    let executor = ScanExecutor::new(engine.clone(), Arc::new(FormatRenderer));
    let store = Arc::new(TaskStore::new(backend));
    let settings = OrchestratorSettings {
        max_concurrency,
        queue_size,
        shutdown_grace: grace,
    };
    let orchestrator = Arc::new(Orchestrator::new(settings, store, executor));
    orchestrator.start();
    Harness {
        engine,
        orchestrator,
    }
}

fn request(target: &str) -> ScanRequest {
    ScanRequest::new(target, "22")
}

async fn eventually<F: Fn() -> bool>(what: &str, check: F) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

async fn wait_for_status(orchestrator: &Orchestrator, id: TaskId, status: TaskStatus) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while orchestrator.get(id).await.map(|t| t.status).ok() != Some(status) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "task {id} never reached {status}");
}

#[tokio::test]
async fn running_tasks_never_exceed_worker_slots() {
    let h = harness(2, 10, Duration::from_secs(1));
    let mut ids = Vec::new();
    for _ in 0..6 {
        ids.push(h.orchestrator.submit(request("10.0.0.1")).await.unwrap().id);
    }

    eventually("two scans to start", || h.engine.started() == 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.engine.started(), 2);

    let status = h.orchestrator.status();
    assert_eq!(status.worker_count, 2);
    assert_eq!(status.running_tasks, 2);
    assert_eq!(status.max_workers, 2);
    assert_eq!(h.orchestrator.metrics().pending, 4);

    h.engine.release(6);
    for id in &ids {
        wait_for_status(&h.orchestrator, *id, TaskStatus::Completed).await;
    }
    assert!(h.engine.peak.load(Ordering::SeqCst) <= 2);

    for id in ids {
        let task = h.orchestrator.get(id).await.unwrap();
        let result = tokio_test::assert_ok!(h.orchestrator.result(id).await);
        assert_eq!(task.result.as_ref(), Some(&result));
        assert_eq!(result.progress, PROGRESS_DONE);
        assert_eq!(result.status, TaskStatus::Completed);
        assert!(task.start_time.is_some() && task.end_time.is_some());
        assert!(task.error.is_none());
    }
    assert_eq!(h.orchestrator.status().worker_count, 0);
    h.orchestrator.shutdown().await;
}

#[tokio::test]
async fn result_of_running_task_is_not_ready() {
    let h = harness(1, 4, Duration::from_secs(1));
    let task = h.orchestrator.submit(request("10.0.0.1")).await.unwrap();
    wait_for_status(&h.orchestrator, task.id, TaskStatus::Running).await;

    match h.orchestrator.result(task.id).await {
        Err(TaskError::NotReady { status }) => assert_eq!(status, TaskStatus::Running),
        other => panic!("expected not ready, got {other:?}"),
    }

    h.engine.release(1);
    wait_for_status(&h.orchestrator, task.id, TaskStatus::Completed).await;
    assert!(h.orchestrator.result(task.id).await.is_ok());
    h.orchestrator.shutdown().await;
}

#[tokio::test]
async fn engine_error_fails_the_task() {
    let h = harness(1, 4, Duration::from_secs(1));
    h.engine.release(1);
    let task = h.orchestrator.submit(request(FAILING_TARGET)).await.unwrap();
    wait_for_status(&h.orchestrator, task.id, TaskStatus::Failed).await;

    let failed = h.orchestrator.get(task.id).await.unwrap();
    assert!(failed.error.as_deref().is_some_and(|e| !e.is_empty()));
    assert!(failed.result.is_none());
    assert!(failed.end_time.is_some());
    h.orchestrator.shutdown().await;
}

#[tokio::test]
async fn cancelling_a_running_task_discards_its_outcome() {
    let h = harness(1, 4, Duration::from_secs(1));
    let task = h.orchestrator.submit(request("10.0.0.1")).await.unwrap();
    wait_for_status(&h.orchestrator, task.id, TaskStatus::Running).await;

    let cancelled = h.orchestrator.cancel(task.id).await.unwrap();
    assert_eq!(cancelled.status, TaskStatus::Cancelled);

    h.engine.release(1);
    eventually("the scan to return", || h.engine.in_flight() == 0).await;
    // Give the worker time to try (and fail) to record the result.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let after = h.orchestrator.get(task.id).await.unwrap();
    assert_eq!(after.status, TaskStatus::Cancelled);
    assert!(after.result.is_none());
    assert!(matches!(
        h.orchestrator.result(task.id).await,
        Err(TaskError::NotReady {
            status: TaskStatus::Cancelled
        })
    ));
    assert!(matches!(
        h.orchestrator.cancel(task.id).await,
        Err(TaskError::InvalidTransition { .. })
    ));
    h.orchestrator.shutdown().await;
}

#[tokio::test]
async fn tasks_cancelled_in_the_queue_never_run() {
    let h = harness(1, 4, Duration::from_secs(1));
    let first = h.orchestrator.submit(request("10.0.0.1")).await.unwrap();
    let second = h.orchestrator.submit(request("10.0.0.2")).await.unwrap();
    wait_for_status(&h.orchestrator, first.id, TaskStatus::Running).await;

    h.orchestrator.cancel(second.id).await.unwrap();
    h.engine.release(2);
    wait_for_status(&h.orchestrator, first.id, TaskStatus::Completed).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.engine.started(), 1);
    let second = h.orchestrator.get(second.id).await.unwrap();
    assert_eq!(second.status, TaskStatus::Cancelled);
    assert!(second.start_time.is_none());
    h.orchestrator.shutdown().await;
}

#[tokio::test]
async fn shutdown_waits_for_running_scans() {
    let h = harness(1, 4, Duration::from_secs(5));
    let task = h.orchestrator.submit(request("10.0.0.1")).await.unwrap();
    wait_for_status(&h.orchestrator, task.id, TaskStatus::Running).await;

    let orchestrator = Arc::clone(&h.orchestrator);
    let shutdown = tokio::spawn(async move { orchestrator.shutdown().await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!shutdown.is_finished());

    h.engine.release(1);
    tokio::time::timeout(Duration::from_secs(5), shutdown)
        .await
        .unwrap()
        .unwrap();

    let finished = h.orchestrator.get(task.id).await.unwrap();
    assert_eq!(finished.status, TaskStatus::Completed);
    assert!(matches!(
        h.orchestrator.submit(request("10.0.0.1")).await,
        Err(TaskError::ShuttingDown)
    ));
}

#[tokio::test]
async fn shutdown_without_grace_aborts_running_scans() {
    let h = harness(1, 4, Duration::ZERO);
    let task = h.orchestrator.submit(request("10.0.0.1")).await.unwrap();
    wait_for_status(&h.orchestrator, task.id, TaskStatus::Running).await;

    tokio::time::timeout(Duration::from_secs(1), h.orchestrator.shutdown())
        .await
        .unwrap();
    assert_eq!(h.engine.started(), 1);
}

#[tokio::test]
async fn shutdown_cancels_tasks_still_queued() {
    let h = harness(1, 4, Duration::from_secs(5));
    let first = h.orchestrator.submit(request("10.0.0.1")).await.unwrap();
    wait_for_status(&h.orchestrator, first.id, TaskStatus::Running).await;
    let queued = h.orchestrator.submit(request("10.0.0.2")).await.unwrap();

    let orchestrator = Arc::clone(&h.orchestrator);
    let shutdown = tokio::spawn(async move { orchestrator.shutdown().await });
    wait_for_status(&h.orchestrator, queued.id, TaskStatus::Cancelled).await;

    h.engine.release(1);
    tokio::time::timeout(Duration::from_secs(5), shutdown)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(h.engine.started(), 1);
    let queued = h.orchestrator.get(queued.id).await.unwrap();
    assert!(queued.start_time.is_none());
    assert!(queued.end_time.is_some());
    assert_eq!(
        h.orchestrator.get(first.id).await.unwrap().status,
        TaskStatus::Completed
    );
}

#[tokio::test]
async fn degraded_storage_serves_every_task_operation() {
    let config = ServerConfig {
        redis_addr: "127.0.0.1:1".to_string(),
        allow_in_memory: true,
        ..Default::default()
    };
    let backend = connect_storage(&config).await.unwrap();
    assert_eq!(backend.name(), "memory");

    let h = harness_on(backend, 1, 4, Duration::from_secs(1));
    assert_eq!(h.orchestrator.status().storage, "memory");

    let done = h.orchestrator.submit(request("10.0.0.1")).await.unwrap();
    h.engine.release(1);
    wait_for_status(&h.orchestrator, done.id, TaskStatus::Completed).await;
    let result = tokio_test::assert_ok!(h.orchestrator.result(done.id).await);
    assert_eq!(result.task_id, done.id);

    let dropped = h.orchestrator.submit(request("10.0.0.2")).await.unwrap();
    let cancelled = tokio_test::assert_ok!(h.orchestrator.cancel(dropped.id).await);
    assert_eq!(cancelled.status, TaskStatus::Cancelled);

    let mut listed: Vec<TaskId> = h.orchestrator.list().await.iter().map(|t| t.id).collect();
    listed.sort_by_key(|id| id.to_string());
    let mut expected = vec![done.id, dropped.id];
    expected.sort_by_key(|id| id.to_string());
    assert_eq!(listed, expected);

    let metrics = h.orchestrator.metrics();
    assert_eq!(metrics.completed, 1);
    assert_eq!(metrics.cancelled, 1);
    h.orchestrator.shutdown().await;
}
