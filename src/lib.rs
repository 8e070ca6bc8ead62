//! # rocketscan - Port Scanner and Scan Job Server
//!
//! rocketscan probes hosts for open ports, either once from the command
//! line or as jobs submitted over HTTP to a long-running server.
//!
//! ## Features
//!
//! - **Scan Types**: TCP connect and UDP probing, with optional banner grabbing
//! - **Flexible Targeting**: Single IPs, hostnames, and CIDR ranges
//! - **Job Server**: Bounded admission queue and a fixed-size worker pool
//! - **Task Store**: Redis-backed records with an in-memory fallback
//! - **Output Formats**: Text, JSON, XML, HTML and CSV
//! - **Bearer Auth**: Optional JWT-protected API
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use rocketscan::orchestrator::ScanExecutor;
//! use rocketscan::render::FormatRenderer;
//! use rocketscan::scanner::NativeEngine;
//! use rocketscan::task::ScanRequest;
//! use rocketscan::types::TaskId;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let executor = ScanExecutor::new(Arc::new(NativeEngine::new()), Arc::new(FormatRenderer));
//!     let request = ScanRequest::new("192.168.1.1", "22,80,443").validate().unwrap();
//!
//!     let result = executor.execute(TaskId::new(), &request).await.unwrap();
//!     println!("{}", result.result);
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Ports, targets and task ids
//! - [`scanner`] - The `ScanEngine` trait and the native engine
//! - [`render`] - Report rendering
//! - [`task`] - Scan requests, task records and results
//! - [`storage`] - Key/value backends and the task cache
//! - [`orchestrator`] - Admission, dispatch and the task query surface
//! - [`server`] - HTTP API
//! - [`config`] - Server configuration
//! - [`error`] - Error types

pub mod banner;
pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod render;
pub mod scanner;
pub mod server;
pub mod services;
pub mod storage;
pub mod task;
pub mod types;

// Re-export commonly used types
pub use error::{CliError, ExecutionError, ScanError, StorageError, TaskError};
pub use orchestrator::{Orchestrator, ScanExecutor};
pub use scanner::{PortResult, PortStatus, ScanEngine, ScanType};
pub use task::{ScanRequest, ScanResult, Task, TaskStatus};
pub use types::{Port, PortSpec, ScanTarget, TargetSpec, TaskId};
