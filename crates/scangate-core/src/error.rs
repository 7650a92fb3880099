use std::path::PathBuf;
use thiserror::Error;

/// Errors raised outside the pipeline's pass/fail flow.
///
/// Tool failures and findings are never errors; they are carried as
/// [`StageOutcome`](crate::stages::StageOutcome) values instead.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("invalid value '{value}' for {name}: {reason}")]
    InvalidConfig {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read report '{}': {source}", path.display())]
    ReportRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize run summary: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GateError>;
