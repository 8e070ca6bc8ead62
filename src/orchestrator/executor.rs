//! Glue between a task and the scan engine and renderer.

use crate::error::{ExecutionError, RenderError};
use crate::render::{RenderOptions, ReportRenderer, ScanReport};
use crate::scanner::ScanEngine;
use crate::task::{ScanRequest, ScanResult, TaskStatus, PROGRESS_DONE};
use crate::types::TaskId;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// Runs one scan request end to end: probe, render, wrap.
#[derive(Clone)]
pub struct ScanExecutor {
    engine: Arc<dyn ScanEngine>,
    renderer: Arc<dyn ReportRenderer>,
}

impl ScanExecutor {
    pub fn new(engine: Arc<dyn ScanEngine>, renderer: Arc<dyn ReportRenderer>) -> Self {
        Self { engine, renderer }
    }

    /// Scan and render `request`. Errors are not retried.
    pub async fn execute(
        &self,
        task_id: TaskId,
        request: &ScanRequest,
    ) -> Result<ScanResult, ExecutionError> {
        let start_time = Utc::now();
        let ports = self.engine.scan(&request.scan_options()).await?;
        let end_time = Utc::now();

        debug!(task_id = %task_id, results = ports.len(), "scan returned");

        let report = ScanReport::new(
            &request.target,
            request.scan_type,
            start_time,
            end_time,
            ports,
        );
        let options = RenderOptions {
            format: request.output_format,
            pretty: request.pretty_output,
        };
        let bytes = self.renderer.render(&report, options)?;
        let result = String::from_utf8(bytes).map_err(RenderError::from)?;

        Ok(ScanResult {
            task_id,
            status: TaskStatus::Completed,
            progress: PROGRESS_DONE,
            start_time,
            end_time,
            result,
        })
    }
}
