use crate::config::{DynamicScanConfig, MissingReportPolicy};
use crate::error::{GateError, Result};
use crate::stages::StageOutcome;
use std::io::ErrorKind;
use std::path::Path;

/// Case-sensitive marker ZAP uses for high-risk alerts. Matched as a bare substring.
pub const HIGH_RISK_MARKER: &str = "High";

/// What was found in the ZAP report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportInspection {
    Missing,
    Clean,
    HighRisk { occurrences: usize },
}

/// Search report text for the high-risk marker.
///
/// No word boundaries, so `"HighlightJS"` also matches.
pub fn scan_text(content: &str) -> ReportInspection {
    match content.matches(HIGH_RISK_MARKER).count() {
        0 => ReportInspection::Clean,
        occurrences => ReportInspection::HighRisk { occurrences },
    }
}

/// Read the report at `path`. A report that does not exist is not an error.
pub fn inspect_report(path: &Path) -> Result<ReportInspection> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(scan_text(&String::from_utf8_lossy(&bytes))),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(ReportInspection::Missing),
        Err(source) => Err(GateError::ReportRead {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Gate on the ZAP report left behind by a successful scan.
pub fn run(config: &DynamicScanConfig, policy: MissingReportPolicy) -> StageOutcome {
    let path = &config.report_path;
    match inspect_report(path) {
        Ok(ReportInspection::Missing) => {
            let message = format!("ZAP report not found at {}", path.display());
            match policy {
                MissingReportPolicy::Pass => StageOutcome::passed(message),
                MissingReportPolicy::Fail => StageOutcome::failed(format!(
                    "{message}. Missing reports are treated as failures."
                )),
            }
        }
        Ok(ReportInspection::Clean) => StageOutcome::passed(
            "No high-risk vulnerabilities found by OWASP ZAP (based on basic string search).",
        ),
        Ok(ReportInspection::HighRisk { occurrences }) => StageOutcome::failed(format!(
            "High-risk vulnerabilities found by OWASP ZAP! ({occurrences} match{} for '{HIGH_RISK_MARKER}')",
            if occurrences == 1 { "" } else { "es" }
        )),
        Err(error) => {
            tracing::warn!(%error, "could not inspect ZAP report");
            StageOutcome::failed(error.to_string())
        }
    }
}
