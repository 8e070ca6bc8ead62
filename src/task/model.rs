//! The task entity and its state machine.
//!
//! Tasks are values. Each transition returns a new `Task` and leaves the
//! original untouched, so the store can swap whole records atomically and
//! readers never observe a half-applied change.

use crate::error::TaskError;
use crate::task::{ScanRequest, ScanResult};
use crate::types::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        Self::Pending,
        Self::Running,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub const fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Cancelled)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
                | (Self::Running, Self::Cancelled)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One admitted scan job and its lifecycle record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub status: TaskStatus,
    pub create_time: DateTime<Utc>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub request: ScanRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ScanResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    /// A fresh `pending` task for an already validated request.
    pub fn new(request: ScanRequest) -> Self {
        Self {
            id: TaskId::new(),
            status: TaskStatus::Pending,
            create_time: Utc::now(),
            start_time: None,
            end_time: None,
            request,
            result: None,
            error: None,
        }
    }

    fn transition(&self, next: TaskStatus) -> Result<Task, TaskError> {
        if !self.status.can_transition_to(next) {
            return Err(TaskError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        let mut task = self.clone();
        task.status = next;
        if next.is_terminal() {
            task.end_time = Some(Utc::now());
        }
        Ok(task)
    }

    /// `pending -> running`, stamping `start_time`.
    pub fn start(&self) -> Result<Task, TaskError> {
        let mut task = self.transition(TaskStatus::Running)?;
        task.start_time = Some(Utc::now());
        Ok(task)
    }

    /// `running -> completed`, attaching the result.
    pub fn complete(&self, result: ScanResult) -> Result<Task, TaskError> {
        let mut task = self.transition(TaskStatus::Completed)?;
        task.result = Some(result);
        Ok(task)
    }

    /// `running -> failed`, recording why.
    pub fn fail(&self, error: impl Into<String>) -> Result<Task, TaskError> {
        let mut task = self.transition(TaskStatus::Failed)?;
        task.error = Some(error.into());
        Ok(task)
    }

    /// `pending|running -> cancelled`.
    ///
    /// Advisory for running tasks: the scan keeps going, but its outcome
    /// can no longer be recorded because `cancelled` is terminal.
    pub fn cancel(&self) -> Result<Task, TaskError> {
        self.transition(TaskStatus::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::PROGRESS_DONE;

    fn pending() -> Task {
        Task::new(ScanRequest::new("127.0.0.1", "22").validate().unwrap())
    }

    fn result_for(task: &Task) -> ScanResult {
        ScanResult {
            task_id: task.id,
            status: TaskStatus::Completed,
            progress: PROGRESS_DONE,
            start_time: Utc::now(),
            end_time: Utc::now(),
            result: "{}".to_string(),
        }
    }

    #[test]
    fn test_happy_path() {
        let task = pending();
        assert!(task.start_time.is_none() && task.end_time.is_none());

        let running = task.start().unwrap();
        assert_eq!(running.status, TaskStatus::Running);
        assert!(running.start_time.is_some());
        assert!(running.end_time.is_none());
        assert!(running.result.is_none());

        let done = running.complete(result_for(&running)).unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.end_time.is_some());
        assert!(done.result.is_some());
        assert_eq!(done.id, task.id);
        assert_eq!(done.request, task.request);
    }

    #[test]
    fn test_failure_records_error_not_result() {
        let failed = pending().start().unwrap().fail("host unreachable").unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("host unreachable"));
        assert!(failed.result.is_none());
    }

    #[test]
    fn test_cancel_rules() {
        assert_eq!(pending().cancel().unwrap().status, TaskStatus::Cancelled);
        assert_eq!(
            pending().start().unwrap().cancel().unwrap().status,
            TaskStatus::Cancelled
        );

        let failed = pending().start().unwrap().fail("boom").unwrap();
        assert!(matches!(
            failed.cancel(),
            Err(TaskError::InvalidTransition {
                from: TaskStatus::Failed,
                to: TaskStatus::Cancelled
            })
        ));
    }

    #[test]
    fn test_terminal_states_stay_terminal() {
        let cancelled = pending().start().unwrap().cancel().unwrap();
        assert!(cancelled.complete(result_for(&cancelled)).is_err());
        assert!(cancelled.fail("late").is_err());
        assert!(pending().complete(result_for(&pending())).is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let running = pending().start().unwrap();
        let done = running.complete(result_for(&running)).unwrap();
        let failed = pending().start().unwrap().fail("refused").unwrap();

        for task in [pending(), done, failed] {
            let json = serde_json::to_string(&task).unwrap();
            let back: Task = serde_json::from_str(&json).unwrap();
            assert_eq!(back, task);
        }
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
        assert!(TaskStatus::ALL.iter().filter(|s| s.is_terminal()).count() == 3);
    }
}
