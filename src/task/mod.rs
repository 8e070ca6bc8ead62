//! Task model: requests, lifecycle records and results.

mod model;
mod request;
mod result;

pub use model::{Task, TaskStatus};
pub use request::{
    ScanRequest, DEFAULT_TIMEOUT, DEFAULT_VERSION_INTENSITY, DEFAULT_WORKERS,
    MAX_VERSION_INTENSITY,
};
pub use result::{ScanResult, PROGRESS_DONE};
