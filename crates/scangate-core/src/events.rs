use crate::exec::CommandOutcome;
use crate::pipeline::PipelineRun;
use crate::stages::{StageKind, StageOutcome};

/// Progress notifications emitted while the pipeline runs, in order.
#[derive(Debug)]
pub enum PipelineEvent<'a> {
    PipelineStarted,
    StageStarted {
        stage: StageKind,
    },
    Warning {
        message: &'a str,
    },
    CommandStarted {
        command_line: &'a str,
    },
    CommandFinished {
        outcome: &'a CommandOutcome,
    },
    StageFinished {
        stage: StageKind,
        outcome: &'a StageOutcome,
    },
    PipelineFinished {
        run: &'a PipelineRun,
    },
}

/// Receives pipeline progress. The console renderer and tests both implement this.
pub trait Observer {
    fn on_event(&mut self, event: &PipelineEvent<'_>);
}

/// Discards events apart from a trace-level log line.
#[derive(Debug, Default)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn on_event(&mut self, event: &PipelineEvent<'_>) {
        tracing::trace!(?event, "pipeline event");
    }
}
