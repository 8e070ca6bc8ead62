//! Serve subcommand implementation.

use crate::config::ServerConfig;
use crate::error::CliResult;
use crate::orchestrator::{Orchestrator, OrchestratorSettings, ScanExecutor};
use crate::render::FormatRenderer;
use crate::scanner::NativeEngine;
use crate::server;
use crate::storage::{connect_storage, TaskStore};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Run the scan job API server.
///
/// Settings come from the configuration file first; every flag given here
/// (or its environment variable) overrides the file.
#[derive(Parser, Debug, Default)]
pub struct ServeCommand {
    /// Address to listen on
    #[arg(long, env = "ROCKETSCAN_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "ROCKETSCAN_PORT")]
    pub port: Option<u16>,

    /// Redis address (host:port); empty keeps tasks in memory only
    #[arg(long, env = "ROCKETSCAN_REDIS_ADDR")]
    pub redis_addr: Option<String>,

    /// Redis password
    #[arg(long, env = "ROCKETSCAN_REDIS_PASSWORD", hide_env_values = true)]
    pub redis_password: Option<String>,

    /// Redis database number
    #[arg(long, env = "ROCKETSCAN_REDIS_DB")]
    pub redis_db: Option<i64>,

    /// Secret used to sign bearer tokens
    #[arg(long, env = "ROCKETSCAN_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Require a bearer token on API routes
    #[arg(long, env = "ROCKETSCAN_ENABLE_AUTH")]
    pub enable_auth: bool,

    /// Username accepted by /auth/login
    #[arg(long, env = "ROCKETSCAN_AUTH_USERNAME")]
    pub auth_username: Option<String>,

    /// Password accepted by /auth/login
    #[arg(long, env = "ROCKETSCAN_AUTH_PASSWORD", hide_env_values = true)]
    pub auth_password: Option<String>,

    /// Maximum number of scans running at once
    #[arg(long, env = "ROCKETSCAN_MAX_CONCURRENCY")]
    pub max_concurrency: Option<usize>,

    /// Maximum number of tasks waiting for a worker
    #[arg(long, env = "ROCKETSCAN_QUEUE_SIZE")]
    pub queue_size: Option<usize>,

    /// Fall back to memory when the configured Redis is unreachable
    #[arg(long = "allow-inmemory", env = "ROCKETSCAN_ALLOW_INMEMORY")]
    pub allow_inmemory: bool,

    /// Milliseconds to wait for running scans on shutdown
    #[arg(long, env = "ROCKETSCAN_SHUTDOWN_GRACE_MS")]
    pub shutdown_grace_ms: Option<u64>,

    /// Probes per second across all scans (0 = unlimited)
    #[arg(long = "rate-limit", env = "ROCKETSCAN_RATE_LIMIT")]
    pub rate_limit: Option<u32>,
}

impl ServeCommand {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(addr) = &self.redis_addr {
            config.redis_addr = addr.clone();
        }
        if let Some(password) = &self.redis_password {
            config.redis_password = password.clone();
        }
        if let Some(db) = self.redis_db {
            config.redis_db = db;
        }
        if let Some(secret) = &self.jwt_secret {
            config.jwt_secret = secret.clone();
        }
        if self.enable_auth {
            config.enable_auth = true;
        }
        if let Some(username) = &self.auth_username {
            config.auth_username = username.clone();
        }
        if let Some(password) = &self.auth_password {
            config.auth_password = password.clone();
        }
        if let Some(max) = self.max_concurrency {
            config.max_concurrency = max;
        }
        if let Some(size) = self.queue_size {
            config.queue_size = size;
        }
        if self.allow_inmemory {
            config.allow_in_memory = true;
        }
        if let Some(grace) = self.shutdown_grace_ms {
            config.shutdown_grace_ms = grace;
        }
        if let Some(rate) = self.rate_limit {
            config.scan_rate_limit = rate;
        }
    }

    /// Execute the serve command.
    pub async fn execute(&self, config_path: Option<&Path>) -> CliResult<()> {
        let mut config = ServerConfig::load(config_path)?;
        self.apply(&mut config);
        config.validate()?;

        let storage = connect_storage(&config).await?;
        info!(backend = storage.name(), "task storage ready");

        let engine = NativeEngine::new().with_rate_limit(config.scan_rate_limit);
        let executor = ScanExecutor::new(Arc::new(engine), Arc::new(FormatRenderer));
        let orchestrator = Arc::new(Orchestrator::new(
            OrchestratorSettings::from(&config),
            Arc::new(TaskStore::new(storage)),
            executor,
        ));
        orchestrator.start();

        server::serve(&config, orchestrator).await?;
        Ok(())
    }
}
