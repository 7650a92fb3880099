use crate::config::GateConfig;
use crate::error::Result;
use crate::events::{Observer, PipelineEvent};
use crate::exec::CommandRunner;
use crate::redact::redact_url;
use crate::stages::{dynamic_scan, report_check, static_analysis};
use crate::stages::{StageKind, StageOutcome, StageRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub const EXIT_PASSED: i32 = 0;
pub const EXIT_FAILED: i32 = 1;

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed { stage: StageKind },
}

/// Everything that happened during one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub config: GateConfig,
    pub stages: Vec<StageRecord>,
    pub verdict: Verdict,
}

impl PipelineRun {
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Passed
    }

    pub fn exit_code(&self) -> i32 {
        match self.verdict {
            Verdict::Passed => EXIT_PASSED,
            Verdict::Failed { .. } => EXIT_FAILED,
        }
    }

    pub fn stage(&self, kind: StageKind) -> Option<&StageRecord> {
        self.stages.iter().find(|record| record.stage == kind)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Run the security gate: static analysis, then the dynamic scan and report check.
///
/// Static analysis failure and a failing report check stop the run at once.
/// A failed scan invocation is recorded but the run still passes.
pub fn run(
    config: &GateConfig,
    runner: &dyn CommandRunner,
    observer: &mut dyn Observer,
) -> PipelineRun {
    let mut recorder = Recorder::new(config);
    observer.on_event(&PipelineEvent::PipelineStarted);

    let static_outcome = recorder.stage(StageKind::StaticAnalysis, observer, |observer| {
        static_analysis::run(&config.static_analysis, runner, observer)
    });
    if halts(StageKind::StaticAnalysis, &static_outcome) {
        return recorder.finish(Verdict::Failed { stage: StageKind::StaticAnalysis }, observer);
    }

    let Some(target) = config.dynamic_scan.target_url.as_deref() else {
        recorder.stage(StageKind::Deployment, observer, |_| {
            StageOutcome::skipped("TARGET_URL not set, cannot simulate deployment for ZAP.")
        });
        for skipped in [StageKind::DynamicScan, StageKind::ReportCheck] {
            recorder.stage(skipped, observer, |_| {
                StageOutcome::skipped("TARGET_URL environment variable not set. Skipping OWASP ZAP scan.")
            });
        }
        return recorder.finish(Verdict::Passed, observer);
    };

    // No deployment happens here; the target is assumed to be live.
    recorder.stage(StageKind::Deployment, observer, |_| {
        StageOutcome::passed(format!("Application deployed to: {}", redact_url(target)))
    });

    let scan_outcome = recorder.stage(StageKind::DynamicScan, observer, |observer| {
        dynamic_scan::run(&config.dynamic_scan, target, runner, observer)
    });
    if halts(StageKind::DynamicScan, &scan_outcome) {
        return recorder.finish(Verdict::Failed { stage: StageKind::DynamicScan }, observer);
    }
    if scan_outcome.is_failed() {
        recorder.stage(StageKind::ReportCheck, observer, |_| {
            StageOutcome::skipped("OWASP ZAP scan failed; no report to check.")
        });
        return recorder.finish(Verdict::Passed, observer);
    }

    let report_outcome = recorder.stage(StageKind::ReportCheck, observer, |_| {
        report_check::run(&config.dynamic_scan, config.missing_report)
    });
    if halts(StageKind::ReportCheck, &report_outcome) {
        return recorder.finish(Verdict::Failed { stage: StageKind::ReportCheck }, observer);
    }

    recorder.finish(Verdict::Passed, observer)
}

/// A stage ends the run only when it failed and its kind gates the pipeline.
fn halts(kind: StageKind, outcome: &StageOutcome) -> bool {
    outcome.is_failed() && kind.halts_on_failure()
}

struct Recorder<'a> {
    config: &'a GateConfig,
    started_at: DateTime<Utc>,
    clock: Instant,
    stages: Vec<StageRecord>,
}

impl<'a> Recorder<'a> {
    fn new(config: &'a GateConfig) -> Self {
        Self {
            config,
            started_at: Utc::now(),
            clock: Instant::now(),
            stages: Vec::new(),
        }
    }

    fn stage<F>(&mut self, kind: StageKind, observer: &mut dyn Observer, body: F) -> StageOutcome
    where
        F: FnOnce(&mut dyn Observer) -> StageOutcome,
    {
        observer.on_event(&PipelineEvent::StageStarted { stage: kind });
        let started = Instant::now();
        let outcome = body(&mut *observer);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        tracing::info!(stage = ?kind, status = outcome.symbol(), elapsed_ms, "stage finished");
        observer.on_event(&PipelineEvent::StageFinished {
            stage: kind,
            outcome: &outcome,
        });

        self.stages.push(StageRecord {
            stage: kind,
            outcome: outcome.clone(),
            elapsed_ms,
        });
        outcome
    }

    fn finish(self, verdict: Verdict, observer: &mut dyn Observer) -> PipelineRun {
        let run = PipelineRun {
            started_at: self.started_at,
            elapsed_ms: self.clock.elapsed().as_millis() as u64,
            config: self.config.clone(),
            stages: self.stages,
            verdict,
        };
        observer.on_event(&PipelineEvent::PipelineFinished { run: &run });
        run
    }
}
