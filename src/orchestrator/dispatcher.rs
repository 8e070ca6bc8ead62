//! Dispatcher loop and scan workers.

use super::executor::ScanExecutor;
use crate::error::TaskError;
use crate::storage::TaskStore;
use crate::task::{Task, TaskStatus};
use crate::types::TaskId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Moves admitted ids from the queue onto worker slots.
pub(crate) struct Dispatcher {
    pub(crate) store: Arc<TaskStore>,
    pub(crate) executor: Arc<ScanExecutor>,
    pub(crate) slots: Arc<Semaphore>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) grace: Duration,
}

impl Dispatcher {
    /// Run until shutdown is signalled or every queue sender is gone, then
    /// drain the workers.
    pub(crate) async fn run(self, mut queue: Receiver<TaskId>) {
        let mut workers = JoinSet::new();

        loop {
            while let Some(joined) = workers.try_join_next() {
                log_join(joined);
            }

            let id = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                next = queue.recv() => match next {
                    Some(id) => id,
                    None => break,
                },
            };

            // Cancelled while it sat in the queue.
            match self.store.get(id).await {
                Some(task) if task.status == TaskStatus::Pending => {}
                Some(task) => {
                    debug!(task_id = %id, status = %task.status, "skipping task that is no longer pending");
                    continue;
                }
                None => {
                    warn!(task_id = %id, "admitted task vanished from the store");
                    continue;
                }
            }

            let permit = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => None,
                permit = Arc::clone(&self.slots).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                cancel_queued(&self.store, id).await;
                break;
            };

            workers.spawn(run_task(
                Arc::clone(&self.store),
                Arc::clone(&self.executor),
                id,
                permit,
            ));
        }

        // Senders holding a reserved slot may still deliver; recv only
        // ends once they have.
        queue.close();
        while let Some(id) = queue.recv().await {
            cancel_queued(&self.store, id).await;
        }
        drain(workers, self.grace).await;
    }
}

/// Cancel a task that was admitted but will never be dispatched.
async fn cancel_queued(store: &TaskStore, id: TaskId) {
    let cancelled = store
        .update(id, |task| match task.status {
            TaskStatus::Pending => task.cancel(),
            status => Err(TaskError::InvalidTransition {
                from: status,
                to: TaskStatus::Cancelled,
            }),
        })
        .await;
    match cancelled {
        Ok(_) => info!(task_id = %id, "queued task cancelled by shutdown"),
        Err(err) => debug!(task_id = %id, error = %err, "queued task left as is"),
    }
}

/// Wait up to `grace` for running workers, then abort whatever is left.
async fn drain(mut workers: JoinSet<()>, grace: Duration) {
    if workers.is_empty() {
        return;
    }
    info!(workers = workers.len(), grace_ms = grace.as_millis() as u64, "waiting for running scans");

    let finished = tokio::time::timeout(grace, async {
        while let Some(joined) = workers.join_next().await {
            log_join(joined);
        }
    })
    .await;

    if finished.is_err() {
        warn!(workers = workers.len(), "grace period over, aborting running scans");
        workers.abort_all();
        while workers.join_next().await.is_some() {}
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(err) = joined {
        if err.is_panic() {
            error!(error = %err, "scan worker panicked");
        }
    }
}

/// Execute one task. The slot is given back when `_permit` drops, after
/// the final state has been written.
async fn run_task(
    store: Arc<TaskStore>,
    executor: Arc<ScanExecutor>,
    id: TaskId,
    _permit: OwnedSemaphorePermit,
) {
    let task = match store.update(id, Task::start).await {
        Ok(task) => task,
        Err(err) => {
            debug!(task_id = %id, error = %err, "task not started");
            return;
        }
    };
    info!(task_id = %id, target = %task.request.target, scan_type = %task.request.scan_type, "scan started");

    let written = match executor.execute(id, &task.request).await {
        Ok(result) => store.update(id, |task| task.complete(result)).await,
        Err(err) => {
            let message = err.to_string();
            store.update(id, |task| task.fail(message)).await
        }
    };

    match written {
        Ok(task) => info!(task_id = %id, status = %task.status, "scan finished"),
        Err(TaskError::InvalidTransition {
            from: TaskStatus::Cancelled,
            ..
        }) => info!(task_id = %id, "task was cancelled while running, outcome discarded"),
        Err(err) => warn!(task_id = %id, error = %err, "could not record scan outcome"),
    }
}
