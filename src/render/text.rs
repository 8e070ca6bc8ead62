//! Plain text report rendering.

use super::ScanReport;
use crate::error::RenderError;
use std::fmt::Write;

const RULE: &str = "───────────────────────────────────────────────────────────────";
const FRAME: &str = "═══════════════════════════════════════════════════════════════";

pub(super) fn render(report: &ScanReport, pretty: bool) -> Result<Vec<u8>, RenderError> {
    let mut out = String::new();

    if pretty {
        writeln!(out, "{FRAME}")?;
        writeln!(out, "                    rocketscan Scan Results")?;
        writeln!(out, "{FRAME}")?;
        writeln!(out)?;
    }

    writeln!(out, "  Target:     {}", report.target)?;
    writeln!(out, "  Scan Type:  {}", report.scan_type)?;
    writeln!(out, "  Started:    {}", report.start_time.to_rfc3339())?;
    writeln!(
        out,
        "  Statistics: {} ports scanned in {:.2}s",
        report.ports_scanned,
        report.duration_ms as f64 / 1000.0
    )?;
    writeln!(
        out,
        "              {} open, {} closed, {} filtered",
        report.open_ports, report.closed_ports, report.filtered_ports
    )?;
    writeln!(out)?;

    if report.results.is_empty() {
        writeln!(out, "  No ports to display.")?;
    } else {
        writeln!(out, "  {RULE}")?;
        writeln!(
            out,
            "  {:<15}  {:>6}  {:<14}  {:<15}  BANNER",
            "HOST", "PORT", "STATE", "SERVICE"
        )?;
        writeln!(out, "  {RULE}")?;
        for result in &report.results {
            let banner = result
                .banner
                .as_deref()
                .map(|b| truncate(b, 35))
                .unwrap_or_default();
            writeln!(
                out,
                "  {:<15}  {:>6}  {:<14}  {:<15}  {}",
                result.host.to_string(),
                result.port.as_u16(),
                result.status.to_string(),
                result.service,
                banner
            )?;
        }
        writeln!(out, "  {RULE}")?;
    }

    if pretty {
        writeln!(out)?;
        writeln!(out, "{FRAME}")?;
    }

    Ok(out.into_bytes())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::sample_report;

    #[test]
    fn test_table_lists_non_closed_ports() {
        let body = String::from_utf8(render(&sample_report(), false).unwrap()).unwrap();
        assert!(body.contains("3 ports scanned in 1.50s"));
        assert!(body.contains("ssh"));
        assert!(body.contains("filtered"));
        assert!(!body.contains("telnet"));
        assert!(!body.contains(FRAME));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("0123456789abcdef", 10), "0123456...");
    }
}
