//! Identifiers for scan tasks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A globally unique task identifier (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a new random task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Key under which the task record is persisted.
    pub fn storage_key(&self) -> String {
        format!("task:{}", self.0)
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = TaskIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| TaskIdError(s.to_string()))
    }
}

/// Error returned when a string is not a task ID.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid task ID: {0}")]
pub struct TaskIdError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
    }

    #[test]
    fn test_parse_roundtrip() {
        let id = TaskId::new();
        let parsed: TaskId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_storage_key() {
        let id: TaskId = "7f9c24e5-1d2b-4c3a-9e8f-0a1b2c3d4e5f".parse().unwrap();
        assert_eq!(id.storage_key(), "task:7f9c24e5-1d2b-4c3a-9e8f-0a1b2c3d4e5f");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("not-a-task".parse::<TaskId>().is_err());
    }
}
