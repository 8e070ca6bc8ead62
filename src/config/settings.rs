//! Server settings and application paths.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Redis address assumed when none is configured. Failing to reach it is
/// never fatal.
pub const DEFAULT_REDIS_ADDR: &str = "localhost:6379";

/// Application directory paths following the XDG Base Directory layout.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/rocketscan)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Resolve the per-user directories. Nothing is created on disk.
    pub fn discover() -> ConfigResult<Self> {
        let project = ProjectDirs::from("com", "rocketscan", "rocketscan")
            .ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the server settings file.
    pub fn server_file(&self) -> PathBuf {
        self.config_dir.join("server.json")
    }
}

/// Settings for the HTTP service and its task engine. Immutable once the
/// server has started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Empty means "use memory, don't probe Redis at all".
    pub redis_addr: String,
    pub redis_password: String,
    pub redis_db: i64,
    /// Worker slots; at most this many scans run at once.
    pub max_concurrency: usize,
    /// Admission queue capacity.
    pub queue_size: usize,
    pub enable_auth: bool,
    /// Fall back to memory when a non-default Redis address is unreachable.
    pub allow_in_memory: bool,
    pub auth_username: String,
    pub auth_password: String,
    /// How long shutdown waits for running scans before aborting them.
    pub shutdown_grace_ms: u64,
    /// Probes per second for the native engine, 0 for unlimited.
    pub scan_rate_limit: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: String::new(),
            redis_addr: DEFAULT_REDIS_ADDR.to_string(),
            redis_password: String::new(),
            redis_db: 0,
            max_concurrency: 10,
            queue_size: 100,
            enable_auth: false,
            allow_in_memory: false,
            auth_username: String::new(),
            auth_password: String::new(),
            shutdown_grace_ms: 10_000,
            scan_rate_limit: 0,
        }
    }
}

impl ServerConfig {
    /// Load settings from an explicit file, or from the XDG location when
    /// `path` is `None`. A missing XDG file yields the defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = path {
            return Self::load_from(path);
        }

        let file = Paths::discover()?.server_file();
        if !file.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.queue_size == 0 {
            return Err(ConfigError::Invalid(
                "queue_size must be at least 1".to_string(),
            ));
        }
        if self.enable_auth {
            if self.jwt_secret.is_empty() {
                return Err(ConfigError::Invalid(
                    "jwt_secret is required when auth is enabled".to_string(),
                ));
            }
            if self.auth_username.is_empty() || self.auth_password.is_empty() {
                return Err(ConfigError::Invalid(
                    "auth_username and auth_password are required when auth is enabled"
                        .to_string(),
                ));
            }
        }
        Ok(())
    }

    /// `host:port` to bind the HTTP listener to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connection URL for the configured Redis instance.
    pub fn redis_url(&self) -> String {
        if self.redis_addr.starts_with("redis://") {
            return self.redis_addr.clone();
        }
        if self.redis_password.is_empty() {
            format!("redis://{}/{}", self.redis_addr, self.redis_db)
        } else {
            format!(
                "redis://:{}@{}/{}",
                self.redis_password, self.redis_addr, self.redis_db
            )
        }
    }

    pub fn uses_default_redis(&self) -> bool {
        self.redis_addr == DEFAULT_REDIS_ADDR
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_concurrency, 10);
        assert_eq!(config.queue_size, 100);
        assert!(config.uses_default_redis());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"port": 9090, "redis_addr": "", "queue_size": 5}}"#).unwrap();

        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.queue_size, 5);
        assert_eq!(config.redis_addr, "");
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServerConfig::load(Some(&dir.path().join("absent.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFailed { .. }));
    }

    #[test]
    fn test_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "port = 8080").unwrap();
        let err = ServerConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFormat(_)));
    }

    #[test]
    fn test_validation() {
        let mut config = ServerConfig {
            max_concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.max_concurrency = 1;
        config.queue_size = 0;
        assert!(config.validate().is_err());

        config.queue_size = 1;
        config.enable_auth = true;
        assert!(config.validate().is_err());

        config.jwt_secret = "secret".to_string();
        config.auth_username = "admin".to_string();
        config.auth_password = "hunter2".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_redis_url() {
        let mut config = ServerConfig::default();
        assert_eq!(config.redis_url(), "redis://localhost:6379/0");

        config.redis_addr = "cache.internal:6380".to_string();
        config.redis_password = "pw".to_string();
        config.redis_db = 3;
        assert_eq!(config.redis_url(), "redis://:pw@cache.internal:6380/3");

        config.redis_addr = "redis://other:6379/1".to_string();
        assert_eq!(config.redis_url(), "redis://other:6379/1");
    }
}
