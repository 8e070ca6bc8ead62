//! Task orchestration.
//!
//! [`Orchestrator`] owns the admission queue, the worker slots and the
//! dispatcher, and is the only way tasks are created, queried or
//! cancelled. Scans run on at most `max_concurrency` workers; at most
//! `queue_size` admitted tasks wait for one.

mod dispatcher;
mod executor;
mod queue;

use crate::config::ServerConfig;
use crate::error::TaskError;
use crate::storage::TaskStore;
use crate::task::{ScanRequest, ScanResult, Task, TaskStatus};
use crate::types::TaskId;
use dispatcher::Dispatcher;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use executor::ScanExecutor;
pub use queue::AdmissionQueue;

/// Pool and queue sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub max_concurrency: usize,
    pub queue_size: usize,
    /// How long shutdown waits for running scans. Zero aborts them at once.
    pub shutdown_grace: Duration,
}

impl From<&ServerConfig> for OrchestratorSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
            queue_size: config.queue_size,
            shutdown_grace: config.shutdown_grace(),
        }
    }
}

/// Live view of the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemStatus {
    /// Tasks admitted but not yet dispatched.
    pub queue_size: usize,
    /// Occupied worker slots.
    pub worker_count: usize,
    pub running_tasks: usize,
    pub max_workers: usize,
    pub queue_capacity: usize,
    /// Backend the task records are written to.
    pub storage: &'static str,
}

/// Number of known tasks in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskMetrics {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

pub struct Orchestrator {
    store: Arc<TaskStore>,
    executor: Arc<ScanExecutor>,
    queue: AdmissionQueue,
    receiver: Mutex<Option<Receiver<TaskId>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    slots: Arc<Semaphore>,
    settings: OrchestratorSettings,
    shutdown: CancellationToken,
}

impl Orchestrator {
    /// Build an orchestrator. Nothing runs until [`Orchestrator::start`].
    ///
    /// Both sizes in `settings` must be at least 1.
    pub fn new(
        settings: OrchestratorSettings,
        store: Arc<TaskStore>,
        executor: ScanExecutor,
    ) -> Self {
        let (queue, receiver) = AdmissionQueue::new(settings.queue_size);
        Self {
            store,
            executor: Arc::new(executor),
            queue,
            receiver: Mutex::new(Some(receiver)),
            dispatcher: Mutex::new(None),
            slots: Arc::new(Semaphore::new(settings.max_concurrency)),
            settings,
            shutdown: CancellationToken::new(),
        }
    }

    /// Spawn the dispatcher. Calling this more than once has no effect.
    pub fn start(&self) {
        let Some(receiver) = self.receiver.lock().take() else {
            return;
        };

        let dispatcher = Dispatcher {
            store: Arc::clone(&self.store),
            executor: Arc::clone(&self.executor),
            slots: Arc::clone(&self.slots),
            shutdown: self.shutdown.clone(),
            grace: self.settings.shutdown_grace,
        };
        *self.dispatcher.lock() = Some(tokio::spawn(dispatcher.run(receiver)));

        info!(
            max_concurrency = self.settings.max_concurrency,
            queue_size = self.settings.queue_size,
            "task dispatcher started"
        );
    }

    /// Validate and admit a scan request.
    ///
    /// Fails with [`TaskError::QueueFull`] without creating anything when
    /// every queue slot is taken.
    pub async fn submit(&self, request: ScanRequest) -> Result<Task, TaskError> {
        if self.shutdown.is_cancelled() {
            return Err(TaskError::ShuttingDown);
        }
        let request = request.validate()?;
        let slot = self.queue.reserve()?;

        let task = Task::new(request);
        self.store.insert(task.clone()).await;

        // Shutdown may have begun while the record was being written, in
        // which case nothing will ever dispatch it.
        if self.shutdown.is_cancelled() {
            drop(slot);
            if let Err(err) = self.store.update(task.id, Task::cancel).await {
                warn!(task_id = %task.id, error = %err, "could not cancel task admitted during shutdown");
            }
            return Err(TaskError::ShuttingDown);
        }
        slot.send(task.id);

        info!(task_id = %task.id, target = %task.request.target, "task admitted");
        Ok(task)
    }

    pub async fn list(&self) -> Vec<Task> {
        self.store.list().await
    }

    pub async fn get(&self, id: TaskId) -> Result<Task, TaskError> {
        self.store
            .get(id)
            .await
            .ok_or_else(|| TaskError::NotFound(id.to_string()))
    }

    /// Cancel a pending or running task.
    ///
    /// A running scan is not interrupted; its outcome is dropped when it
    /// finishes.
    pub async fn cancel(&self, id: TaskId) -> Result<Task, TaskError> {
        let task = self.store.update(id, Task::cancel).await?;
        info!(task_id = %id, "task cancelled");
        Ok(task)
    }

    /// The result of a completed task.
    pub async fn result(&self, id: TaskId) -> Result<ScanResult, TaskError> {
        let task = self.get(id).await?;
        if task.status != TaskStatus::Completed {
            return Err(TaskError::NotReady {
                status: task.status,
            });
        }
        task.result.ok_or(TaskError::NotReady {
            status: task.status,
        })
    }

    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            queue_size: self.queue.depth(),
            worker_count: self.settings.max_concurrency - self.slots.available_permits(),
            running_tasks: self.store.running_count(),
            max_workers: self.settings.max_concurrency,
            queue_capacity: self.queue.capacity(),
            storage: self.store.backend().name(),
        }
    }

    pub fn metrics(&self) -> TaskMetrics {
        let counts = self.store.status_counts();
        let count = |status: TaskStatus| counts.get(&status).copied().unwrap_or_default();
        TaskMetrics {
            pending: count(TaskStatus::Pending),
            running: count(TaskStatus::Running),
            completed: count(TaskStatus::Completed),
            failed: count(TaskStatus::Failed),
            cancelled: count(TaskStatus::Cancelled),
        }
    }

    /// Stop accepting work, let running scans finish within the grace
    /// period and close the storage backend.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        // Never started: dropping the receiver closes the queue.
        drop(self.receiver.lock().take());

        let handle = self.dispatcher.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "dispatcher ended abnormally");
            }
        }

        if let Err(err) = self.store.backend().close().await {
            warn!(error = %err, "failed to close storage backend");
        }
        info!("task orchestrator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ScanError, StorageResult};
    use crate::render::FormatRenderer;
    use crate::scanner::{PortResult, ScanEngine, ScanOptions};
    use crate::storage::{MemoryStorage, Storage};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    struct FailingEngine;

    #[async_trait]
    impl ScanEngine for FailingEngine {
        async fn scan(&self, _: &ScanOptions) -> Result<Vec<PortResult>, ScanError> {
            Err(ScanError::HostUnreachable)
        }
    }

    /// Memory storage whose first write waits for `release`.
    #[derive(Default)]
    struct StallingStorage {
        inner: MemoryStorage,
        stalled: AtomicBool,
        release: Notify,
    }

    #[async_trait]
    impl Storage for StallingStorage {
        async fn set(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()> {
            if !self.stalled.swap(true, Ordering::SeqCst) {
                self.release.notified().await;
            }
            self.inner.set(key, value, ttl).await
        }
        async fn get(&self, key: &str) -> StorageResult<Option<String>> {
            self.inner.get(key).await
        }
        async fn scan_keys(&self, pattern: &str) -> StorageResult<Vec<String>> {
            self.inner.scan_keys(pattern).await
        }
        async fn close(&self) -> StorageResult<()> {
            self.inner.close().await
        }
        fn name(&self) -> &'static str {
            "stalling"
        }
    }

    fn orchestrator(max_concurrency: usize, queue_size: usize) -> Orchestrator {
        orchestrator_on(Arc::new(MemoryStorage::new()), max_concurrency, queue_size)
    }

    fn orchestrator_on(
        backend: Arc<dyn Storage>,
        max_concurrency: usize,
        queue_size: usize,
    ) -> Orchestrator {
        let settings = OrchestratorSettings {
            max_concurrency,
            queue_size,
            shutdown_grace: Duration::from_millis(100),
        };
        let store = Arc::new(TaskStore::new(backend));
        let executor = ScanExecutor::new(Arc::new(FailingEngine), Arc::new(FormatRenderer));
        Orchestrator::new(settings, store, executor)
    }

    fn request() -> ScanRequest {
        ScanRequest::new("127.0.0.1", "22")
    }

    #[tokio::test]
    async fn test_submit_defaults_and_pending() {
        let orchestrator = orchestrator(1, 4);
        let task = orchestrator
            .submit(ScanRequest::new("example.com", "80,443"))
            .await
            .unwrap();

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.request.timeout, Duration::from_secs(5));
        assert_eq!(task.request.workers, 100);
        assert_eq!(orchestrator.get(task.id).await.unwrap(), task);
        assert_eq!(orchestrator.status().queue_size, 1);
    }

    #[tokio::test]
    async fn test_validation_failure_creates_nothing() {
        let orchestrator = orchestrator(1, 4);
        let err = orchestrator.submit(ScanRequest::new("", "80")).await.unwrap_err();
        assert_eq!(err.to_string(), "target required");
        assert!(orchestrator.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_queue_full_rejects_without_creating() {
        let orchestrator = orchestrator(1, 3);
        for _ in 0..3 {
            orchestrator.submit(request()).await.unwrap();
        }

        let err = orchestrator.submit(request()).await.unwrap_err();
        assert!(matches!(err, TaskError::QueueFull));
        assert_eq!(orchestrator.list().await.len(), 3);
        assert_eq!(orchestrator.metrics().pending, 3);
    }

    #[tokio::test]
    async fn test_cancel_pending_and_terminal() {
        let orchestrator = orchestrator(1, 4);
        let task = orchestrator.submit(request()).await.unwrap();

        let cancelled = orchestrator.cancel(task.id).await.unwrap();
        assert_eq!(cancelled.status, TaskStatus::Cancelled);
        assert!(cancelled.end_time.is_some());

        let err = orchestrator.cancel(task.id).await.unwrap_err();
        assert!(matches!(
            err,
            TaskError::InvalidTransition {
                from: TaskStatus::Cancelled,
                to: TaskStatus::Cancelled
            }
        ));
        assert!(matches!(
            orchestrator.cancel(TaskId::new()).await,
            Err(TaskError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_result_of_pending_task_is_not_ready() {
        let orchestrator = orchestrator(1, 4);
        let task = orchestrator.submit(request()).await.unwrap();
        assert!(matches!(
            orchestrator.result(task.id).await,
            Err(TaskError::NotReady {
                status: TaskStatus::Pending
            })
        ));
    }

    #[tokio::test]
    async fn test_engine_failure_marks_task_failed() {
        let orchestrator = orchestrator(1, 4);
        orchestrator.start();
        let task = orchestrator.submit(request()).await.unwrap();

        let failed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let task = orchestrator.get(task.id).await.unwrap();
                if task.status.is_terminal() {
                    break task;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(failed.status, TaskStatus::Failed);
        assert!(failed.error.as_deref().is_some_and(|e| !e.is_empty()));
        assert!(failed.result.is_none());
        assert_eq!(orchestrator.metrics().failed, 1);
        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn test_submit_after_shutdown() {
        let orchestrator = orchestrator(1, 4);
        orchestrator.start();
        orchestrator.shutdown().await;
        assert!(matches!(
            orchestrator.submit(request()).await,
            Err(TaskError::ShuttingDown)
        ));
    }

    #[tokio::test]
    async fn test_submit_racing_shutdown_is_rejected_and_cancelled() {
        let storage = Arc::new(StallingStorage::default());
        let orchestrator = Arc::new(orchestrator_on(storage.clone(), 1, 4));
        orchestrator.start();

        let submit = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.submit(request()).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let shutdown = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.shutdown().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        // The dispatcher waits for the slot the submitter still holds.
        assert!(!shutdown.is_finished());

        storage.release.notify_one();
        assert!(matches!(
            submit.await.unwrap(),
            Err(TaskError::ShuttingDown)
        ));
        tokio::time::timeout(Duration::from_secs(5), shutdown)
            .await
            .unwrap()
            .unwrap();

        let tasks = orchestrator.list().await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, TaskStatus::Cancelled);
        assert_eq!(orchestrator.metrics().pending, 0);
    }
}
