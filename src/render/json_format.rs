//! JSON report rendering.

use super::ScanReport;
use crate::error::RenderError;

pub(super) fn render(report: &ScanReport, pretty: bool) -> Result<Vec<u8>, RenderError> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(report)?
    } else {
        serde_json::to_vec(report)?
    };
    Ok(bytes)
}
