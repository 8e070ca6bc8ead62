//! Report rendering.
//!
//! Turns the port results of one scan into a formatted byte buffer. The
//! orchestration layer only sees the [`ReportRenderer`] trait; the
//! built-in [`FormatRenderer`] handles text, JSON, XML, HTML and CSV.

mod csv_format;
mod html;
mod json_format;
mod text;
mod xml_format;

use crate::error::RenderError;
use crate::scanner::{PortResult, PortStatus, ScanType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output format for rendered reports.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable plain text
    Text,
    /// JSON structured output
    #[default]
    Json,
    /// XML document
    Xml,
    /// Standalone HTML page
    Html,
    /// CSV format for data analysis
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Html => "html",
            Self::Csv => "csv",
        };
        f.write_str(name)
    }
}

/// How a report should be rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub format: OutputFormat,
    pub pretty: bool,
}

/// Everything a renderer gets to see about a finished scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub target: String,
    pub scan_type: ScanType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub ports_scanned: usize,
    pub open_ports: usize,
    pub closed_ports: usize,
    pub filtered_ports: usize,
    /// Every probed port except closed ones, which only show up in the counts.
    pub results: Vec<PortResult>,
}

impl ScanReport {
    pub fn new(
        target: impl Into<String>,
        scan_type: ScanType,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        results: Vec<PortResult>,
    ) -> Self {
        let count = |wanted: &[PortStatus]| {
            results
                .iter()
                .filter(|r| wanted.contains(&r.status))
                .count()
        };
        let open_ports = count(&[PortStatus::Open, PortStatus::OpenFiltered]);
        let closed_ports = count(&[PortStatus::Closed]);
        let filtered_ports = count(&[PortStatus::Filtered]);
        let ports_scanned = results.len();
        let duration_ms = (end_time - start_time).num_milliseconds().max(0) as u64;

        Self {
            target: target.into(),
            scan_type,
            start_time,
            end_time,
            duration_ms,
            ports_scanned,
            open_ports,
            closed_ports,
            filtered_ports,
            results: results
                .into_iter()
                .filter(|r| r.status != PortStatus::Closed)
                .collect(),
        }
    }
}

/// Formats scan reports.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, report: &ScanReport, options: RenderOptions) -> Result<Vec<u8>, RenderError>;
}

/// The built-in renderer covering every [`OutputFormat`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatRenderer;

impl ReportRenderer for FormatRenderer {
    fn render(&self, report: &ScanReport, options: RenderOptions) -> Result<Vec<u8>, RenderError> {
        match options.format {
            OutputFormat::Text => text::render(report, options.pretty),
            OutputFormat::Json => json_format::render(report, options.pretty),
            OutputFormat::Xml => xml_format::render(report, options.pretty),
            OutputFormat::Html => html::render(report),
            OutputFormat::Csv => csv_format::render(report),
        }
    }
}

/// Escape the five XML special characters. Shared by the XML and HTML
/// renderers.
fn escape_markup(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
