//! Task and system endpoints.

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::orchestrator::{SystemStatus, TaskMetrics};
use crate::task::{ScanRequest, ScanResult, Task, TaskStatus};
use crate::types::TaskId;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub task_id: TaskId,
    pub status: TaskStatus,
}

#[derive(Debug, Serialize)]
pub struct TaskList {
    pub tasks: Vec<Task>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub message: &'static str,
    pub task_id: TaskId,
    pub status: TaskStatus,
}

/// Unparsable ids can't name a task, so they are simply not found.
fn parse_id(raw: &str) -> ApiResult<TaskId> {
    raw.parse().map_err(|_| ApiError::not_found("task not found"))
}

/// POST /scan
pub async fn submit_scan(
    State(state): State<AppState>,
    payload: Result<Json<ScanRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let Json(request) = payload?;
    let task = state.orchestrator.submit(request).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            task_id: task.id,
            status: task.status,
        }),
    ))
}

/// GET /scan/tasks
pub async fn list_tasks(State(state): State<AppState>) -> Json<TaskList> {
    Json(TaskList {
        tasks: state.orchestrator.list().await,
    })
}

/// GET /scan/tasks/{id}
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Task>> {
    let id = parse_id(&id)?;
    Ok(Json(state.orchestrator.get(id).await?))
}

/// DELETE /scan/tasks/{id}
pub async fn cancel_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    let id = parse_id(&id)?;
    let task = state.orchestrator.cancel(id).await?;
    Ok(Json(CancelResponse {
        message: "task cancelled",
        task_id: task.id,
        status: task.status,
    }))
}

/// GET /scan/tasks/{id}/result
pub async fn task_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ScanResult>> {
    let id = parse_id(&id)?;
    Ok(Json(state.orchestrator.result(id).await?))
}

/// GET /system/status
pub async fn system_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(state.orchestrator.status())
}

/// GET /system/metrics
pub async fn system_metrics(State(state): State<AppState>) -> Json<TaskMetrics> {
    Json(state.orchestrator.metrics())
}
