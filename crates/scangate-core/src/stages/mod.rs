pub mod dynamic_scan;
pub mod report_check;
pub mod static_analysis;

use serde::{Deserialize, Serialize};

/// The phases of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    StaticAnalysis,
    Deployment,
    DynamicScan,
    ReportCheck,
}

impl StageKind {
    pub fn title(&self) -> &str {
        match self {
            StageKind::StaticAnalysis => "SonarQube Analysis",
            StageKind::Deployment => "Deployment Check",
            StageKind::DynamicScan => "OWASP ZAP Scan",
            StageKind::ReportCheck => "ZAP Report Check",
        }
    }

    /// Whether a failure in this stage ends the run with a failing exit code.
    ///
    /// A failed ZAP invocation is reported but does not fail the run; only
    /// the report check gates on dynamic results.
    pub fn halts_on_failure(&self) -> bool {
        match self {
            StageKind::StaticAnalysis | StageKind::ReportCheck => true,
            StageKind::Deployment | StageKind::DynamicScan => false,
        }
    }
}

/// What a stage concluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Skipped { reason: String },
    Passed { detail: String },
    Failed { detail: String },
}

impl StageOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        StageOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn passed(detail: impl Into<String>) -> Self {
        StageOutcome::Passed {
            detail: detail.into(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        StageOutcome::Failed {
            detail: detail.into(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StageOutcome::Skipped { .. })
    }

    pub fn symbol(&self) -> &str {
        match self {
            StageOutcome::Skipped { .. } => "SKIP",
            StageOutcome::Passed { .. } => "PASS",
            StageOutcome::Failed { .. } => "FAIL",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            StageOutcome::Skipped { reason } => reason,
            StageOutcome::Passed { detail } | StageOutcome::Failed { detail } => detail,
        }
    }
}

/// A finished stage as it appears in the run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageKind,
    pub outcome: StageOutcome,
    pub elapsed_ms: u64,
}
