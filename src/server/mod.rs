//! HTTP control plane.
//!
//! Every route lives under `/api/v1`. When auth is enabled, everything
//! except the two `/auth` routes needs a bearer access token.

pub mod auth;
mod error;
mod handlers;

use crate::config::ServerConfig;
use crate::orchestrator::Orchestrator;
use auth::Authenticator;
use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

pub use error::{ApiError, ApiResult};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub auth: Arc<Authenticator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, config: &ServerConfig) -> Self {
        Self {
            orchestrator,
            auth: Arc::new(Authenticator::from_config(config)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/scan", post(handlers::submit_scan))
        .route("/scan/tasks", get(handlers::list_tasks))
        .route(
            "/scan/tasks/{id}",
            get(handlers::get_task).delete(handlers::cancel_task),
        )
        .route("/scan/tasks/{id}/result", get(handlers::task_result))
        .route("/system/status", get(handlers::system_status))
        .route("/system/metrics", get(handlers::system_metrics))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let public = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh));

    Router::new()
        .nest("/api/v1", protected.merge(public))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Serve the API until Ctrl-C, then shut the orchestrator down.
pub async fn serve(config: &ServerConfig, orchestrator: Arc<Orchestrator>) -> std::io::Result<()> {
    let listener = TcpListener::bind(config.bind_addr()).await?;
    info!(addr = %listener.local_addr()?, auth = config.enable_auth, "API server listening");

    let app = router(AppState::new(Arc::clone(&orchestrator), config));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API server stopped, draining tasks");
    orchestrator.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
