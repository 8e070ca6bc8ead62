//! Core type definitions using newtype patterns for type safety.

mod port;
mod target;
mod task_id;

pub use port::{Port, PortError, PortSpec};
pub use target::{ScanTarget, TargetError, TargetSpec};
pub use task_id::{TaskId, TaskIdError};
