//! The rendered outcome of a completed task.

use crate::task::TaskStatus;
use crate::types::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress reported by a finished scan.
pub const PROGRESS_DONE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub task_id: TaskId,
    pub status: TaskStatus,
    /// 0 until the scan finishes, 100 once it has.
    pub progress: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Report produced by the renderer in the requested output format.
    pub result: String,
}
