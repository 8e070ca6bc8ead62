//! Write-through task cache.

use super::{Storage, TASK_KEY_PATTERN, TASK_TTL};
use crate::error::{StorageResult, TaskError};
use crate::task::{Task, TaskStatus};
use crate::types::TaskId;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Authoritative in-process view of every task this process knows about,
/// written through to a [`Storage`] backend.
///
/// Each task value is replaced whole under its map entry lock, so readers
/// never observe a half-applied transition. Writers to the same task also
/// hold a per-task mutex across the swap and the backend write, so the
/// backend sees updates in the same order as the cache. Backend failures
/// are logged, not returned: the cache stays the source of truth for this
/// process.
///
/// Terminal tasks are dropped from the cache once their record would have
/// expired from the backend.
pub struct TaskStore {
    cache: DashMap<TaskId, Task>,
    writers: DashMap<TaskId, Arc<Mutex<()>>>,
    backend: Arc<dyn Storage>,
}

impl TaskStore {
    pub fn new(backend: Arc<dyn Storage>) -> Self {
        Self {
            cache: DashMap::new(),
            writers: DashMap::new(),
            backend,
        }
    }

    pub fn backend(&self) -> &Arc<dyn Storage> {
        &self.backend
    }

    /// Add a new task.
    pub async fn insert(&self, task: Task) {
        self.evict_expired();

        let writer = self.writer(task.id);
        let _write = writer.lock().await;
        self.cache.insert(task.id, task.clone());
        self.persist(&task).await;
    }

    /// Replace a task with `f(current)`.
    ///
    /// Concurrent updates to the same task are serialized up to and
    /// including the backend write, and each sees the previous one's
    /// output. Tasks only known to the backend are pulled into the cache
    /// first.
    pub async fn update<F>(&self, id: TaskId, f: F) -> Result<Task, TaskError>
    where
        F: FnOnce(&Task) -> Result<Task, TaskError>,
    {
        let writer = self.writer(id);
        let _write = writer.lock().await;

        if !self.cache.contains_key(&id) {
            match self.load(id).await {
                Some(task) => {
                    self.cache.entry(id).or_insert(task);
                }
                None => {
                    self.writers.remove(&id);
                    return Err(TaskError::NotFound(id.to_string()));
                }
            }
        }

        let updated = {
            let mut entry = self
                .cache
                .get_mut(&id)
                .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
            let next = f(entry.value())?;
            *entry = next.clone();
            next
        };

        self.persist(&updated).await;
        Ok(updated)
    }

    /// Look a task up, falling back to the backend for tasks written by
    /// another process.
    pub async fn get(&self, id: TaskId) -> Option<Task> {
        if let Some(task) = self.cache.get(&id) {
            return Some(task.clone());
        }
        self.load(id).await
    }

    /// Every known task, in no particular order. The cached copy wins when
    /// a task is in both places.
    pub async fn list(&self) -> Vec<Task> {
        let mut tasks: HashMap<TaskId, Task> = HashMap::new();

        match self.backend.scan_keys(TASK_KEY_PATTERN).await {
            Ok(keys) => {
                for key in keys {
                    let Some(id) = key
                        .strip_prefix("task:")
                        .and_then(|raw| raw.parse::<TaskId>().ok())
                    else {
                        continue;
                    };
                    if self.cache.contains_key(&id) {
                        continue;
                    }
                    if let Some(task) = self.load(id).await {
                        tasks.insert(id, task);
                    }
                }
            }
            Err(err) => {
                warn!(backend = self.backend.name(), error = %err, "task scan failed, listing cached tasks only");
            }
        }

        for entry in self.cache.iter() {
            tasks.insert(*entry.key(), entry.value().clone());
        }
        tasks.into_values().collect()
    }

    /// Number of cached tasks in each status. Every status is present.
    pub fn status_counts(&self) -> HashMap<TaskStatus, usize> {
        let mut counts: HashMap<TaskStatus, usize> =
            TaskStatus::ALL.iter().map(|&status| (status, 0)).collect();
        for entry in self.cache.iter() {
            *counts.entry(entry.status).or_default() += 1;
        }
        counts
    }

    pub fn running_count(&self) -> usize {
        self.cache
            .iter()
            .filter(|entry| entry.status == TaskStatus::Running)
            .count()
    }

    /// Drop terminal tasks whose backend record has expired, along with
    /// their writer locks.
    fn evict_expired(&self) {
        let Ok(ttl) = chrono::Duration::from_std(TASK_TTL) else {
            return;
        };
        let cutoff = Utc::now() - ttl;
        let expired: Vec<TaskId> = self
            .cache
            .iter()
            .filter(|entry| {
                entry.status.is_terminal() && entry.end_time.is_some_and(|end| end <= cutoff)
            })
            .map(|entry| *entry.key())
            .collect();

        for id in &expired {
            self.cache.remove(id);
            self.writers.remove(id);
        }
        if !expired.is_empty() {
            debug!(evicted = expired.len(), "dropped expired tasks from cache");
        }
    }

    fn writer(&self, id: TaskId) -> Arc<Mutex<()>> {
        self.writers.entry(id).or_default().value().clone()
    }

    async fn load(&self, id: TaskId) -> Option<Task> {
        match self.read(id).await {
            Ok(task) => task,
            Err(err) => {
                warn!(task_id = %id, backend = self.backend.name(), error = %err, "failed to read task from backend");
                None
            }
        }
    }

    async fn read(&self, id: TaskId) -> StorageResult<Option<Task>> {
        let Some(raw) = self.backend.get(&id.storage_key()).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn persist(&self, task: &Task) {
        match self.write(task).await {
            Ok(()) => debug!(task_id = %task.id, status = %task.status, "task persisted"),
            Err(err) => {
                warn!(task_id = %task.id, backend = self.backend.name(), error = %err, "failed to persist task")
            }
        }
    }

    async fn write(&self, task: &Task) -> StorageResult<()> {
        let json = serde_json::to_string(task)?;
        self.backend.set(&task.id.storage_key(), &json, TASK_TTL).await
    }
}
