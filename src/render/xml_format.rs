//! XML report rendering.

use super::{escape_markup, ScanReport};
use crate::error::RenderError;
use std::fmt::Write;

pub(super) fn render(report: &ScanReport, pretty: bool) -> Result<Vec<u8>, RenderError> {
    let (nl, i1, i2, i3) = if pretty {
        ("\n", "  ", "    ", "      ")
    } else {
        ("", "", "", "")
    };

    let mut out = String::new();
    write!(out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>{nl}")?;
    write!(
        out,
        "<scanreport target=\"{}\" scan_type=\"{}\">{nl}",
        escape_markup(&report.target),
        report.scan_type
    )?;
    write!(
        out,
        "{i1}<timing start=\"{}\" end=\"{}\" duration_ms=\"{}\"/>{nl}",
        report.start_time.to_rfc3339(),
        report.end_time.to_rfc3339(),
        report.duration_ms
    )?;
    write!(
        out,
        "{i1}<summary scanned=\"{}\" open=\"{}\" closed=\"{}\" filtered=\"{}\"/>{nl}",
        report.ports_scanned, report.open_ports, report.closed_ports, report.filtered_ports
    )?;
    write!(out, "{i1}<ports>{nl}")?;
    for result in &report.results {
        write!(
            out,
            "{i2}<port host=\"{}\" number=\"{}\" state=\"{}\" service=\"{}\"",
            result.host,
            result.port.as_u16(),
            escape_markup(&result.status.to_string()),
            escape_markup(&result.service)
        )?;
        if let Some(ms) = result.response_time_ms {
            write!(out, " response_time_ms=\"{ms}\"")?;
        }
        match &result.banner {
            Some(banner) => {
                write!(out, ">{nl}")?;
                write!(out, "{i3}<banner>{}</banner>{nl}", escape_markup(banner))?;
                write!(out, "{i2}</port>{nl}")?;
            }
            None => write!(out, "/>{nl}")?,
        }
    }
    write!(out, "{i1}</ports>{nl}")?;
    write!(out, "</scanreport>{nl}")?;

    Ok(out.into_bytes())
}
