//! Error types for rocketscan.
//!
//! Uses `thiserror` for ergonomic error definitions. Every error here is
//! recoverable at the boundary where it occurs; the binary only gives up
//! on configuration errors and on an unreachable durable store.

use crate::scanner::ScanType;
use crate::task::TaskStatus;
use crate::types::{PortError, TargetError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the scan engine.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid target: {0}")]
    InvalidTarget(#[from] TargetError),

    #[error("Invalid port specification: {0}")]
    InvalidPorts(#[from] PortError),

    #[error("Scan type '{0}' is not supported by this engine")]
    UnsupportedScanType(ScanType),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection timed out")]
    Timeout,

    #[error("Connection refused")]
    ConnectionRefused,

    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("Host unreachable")]
    HostUnreachable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while rendering a report.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("JSON rendering failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV rendering failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("report formatting failed")]
    Fmt(#[from] std::fmt::Error),

    #[error("report is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// A scan that could not produce a result. The task ends up `failed`.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("rendering failed: {0}")]
    Render(#[from] RenderError),
}

/// A scan request rejected before any task exists.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("target required")]
    TargetRequired,

    #[error("ports required")]
    PortsRequired,
}

/// Errors from the task lifecycle surface.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("task queue is full")]
    QueueFull,

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("cannot move task from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("task has not completed (status: {status})")]
    NotReady { status: TaskStatus },

    #[error("task service is shutting down")]
    ShuttingDown,
}

/// Storage backend errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("durable store at {addr} is unavailable: {reason}")]
    Unavailable { addr: String, reason: String },

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("task record could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("invalid configuration format: {0}")]
    InvalidFormat(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Authentication failures on the HTTP control plane.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("missing credentials")]
    MissingCredentials,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid token")]
    InvalidToken,

    #[error("token cannot be used here")]
    WrongTokenKind,

    #[error("token signing failed: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

/// Errors surfaced by CLI commands.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type CliResult<T> = Result<T, CliError>;
