//! CSV report rendering.

use super::ScanReport;
use crate::error::RenderError;

pub(super) fn render(report: &ScanReport) -> Result<Vec<u8>, RenderError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["host", "port", "status", "service", "banner", "response_time_ms"])?;

    for result in &report.results {
        wtr.write_record([
            result.host.to_string().as_str(),
            result.port.to_string().as_str(),
            result.status.to_string().as_str(),
            result.service.as_str(),
            result.banner.as_deref().unwrap_or(""),
            result
                .response_time_ms
                .map_or(String::new(), |t| t.to_string())
                .as_str(),
        ])?;
    }

    wtr.into_inner()
        .map_err(|e| RenderError::Csv(e.into_error().into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::sample_report;

    #[test]
    fn test_header_and_rows() {
        let body = String::from_utf8(render(&sample_report()).unwrap()).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines[0], "host,port,status,service,banner,response_time_ms");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("10.0.0.5,22,open,ssh,"));
    }
}
