//! Configuration management for rocketscan.
//!
//! The server reads an optional JSON file (explicit path or the XDG config
//! directory) and lets command-line flags override individual values.

mod settings;

pub use settings::{Paths, ServerConfig, DEFAULT_REDIS_ADDR};
