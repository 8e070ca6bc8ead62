//! HTML report rendering. Produces a single self-contained page.

use super::{escape_markup, ScanReport};
use crate::error::RenderError;
use crate::scanner::PortStatus;
use std::fmt::Write;

const STYLE: &str = "body{font-family:sans-serif;margin:2em}\
table{border-collapse:collapse}\
th,td{border:1px solid #ccc;padding:4px 8px;text-align:left}\
.open{color:#1a7f37;font-weight:bold}.filtered{color:#9a6700}";

pub(super) fn render(report: &ScanReport) -> Result<Vec<u8>, RenderError> {
    let target = escape_markup(&report.target);
    let mut out = String::new();

    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html lang=\"en\">")?;
    writeln!(out, "<head>")?;
    writeln!(out, "<meta charset=\"utf-8\">")?;
    writeln!(out, "<title>Scan report for {target}</title>")?;
    writeln!(out, "<style>{STYLE}</style>")?;
    writeln!(out, "</head>")?;
    writeln!(out, "<body>")?;
    writeln!(out, "<h1>Scan report for {target}</h1>")?;
    writeln!(
        out,
        "<p>{} scan started {}, {} ports in {} ms: {} open, {} closed, {} filtered.</p>",
        report.scan_type,
        report.start_time.to_rfc3339(),
        report.ports_scanned,
        report.duration_ms,
        report.open_ports,
        report.closed_ports,
        report.filtered_ports
    )?;

    if report.results.is_empty() {
        writeln!(out, "<p>No ports to display.</p>")?;
    } else {
        writeln!(out, "<table>")?;
        writeln!(
            out,
            "<tr><th>Host</th><th>Port</th><th>State</th><th>Service</th><th>Banner</th></tr>"
        )?;
        for result in &report.results {
            let class = match result.status {
                PortStatus::Open | PortStatus::OpenFiltered => "open",
                _ => "filtered",
            };
            writeln!(
                out,
                "<tr><td>{}</td><td>{}</td><td class=\"{class}\">{}</td><td>{}</td><td>{}</td></tr>",
                result.host,
                result.port.as_u16(),
                escape_markup(&result.status.to_string()),
                escape_markup(&result.service),
                escape_markup(result.banner.as_deref().unwrap_or(""))
            )?;
        }
        writeln!(out, "</table>")?;
    }

    writeln!(out, "</body>")?;
    writeln!(out, "</html>")?;
    Ok(out.into_bytes())
}
