pub mod config;
pub mod error;
pub mod events;
pub mod exec;
pub mod pipeline;
pub mod redact;
pub mod stages;

pub use config::{GateConfig, MissingReportPolicy};
pub use error::GateError;
pub use events::{NullObserver, Observer, PipelineEvent};
pub use exec::{CommandOutcome, CommandRunner, CommandSpec, ExitState, SystemRunner};
pub use pipeline::{PipelineRun, Verdict};
pub use stages::{StageKind, StageOutcome, StageRecord};
