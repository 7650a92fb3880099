use colored::*;
use scangate_core::{
    CommandOutcome, Observer, PipelineEvent, PipelineRun, StageKind, StageOutcome, Verdict,
};

/// Streams pipeline progress to the terminal as it happens.
#[derive(Debug, Default)]
pub struct ConsoleObserver;

impl Observer for ConsoleObserver {
    fn on_event(&mut self, event: &PipelineEvent<'_>) {
        match event {
            PipelineEvent::PipelineStarted => print_banner(),
            PipelineEvent::StageStarted { stage } => print_stage_header(*stage),
            PipelineEvent::Warning { message } => {
                println!(" {} {}", " WARN ".on_yellow().black().bold(), message);
            }
            PipelineEvent::CommandStarted { command_line } => {
                println!(" {} Running command: {}", "|-".dimmed(), command_line.cyan());
            }
            PipelineEvent::CommandFinished { outcome } => print_command_output(outcome),
            PipelineEvent::StageFinished { stage, outcome } => print_stage_outcome(*stage, outcome),
            PipelineEvent::PipelineFinished { run } => print_summary(run),
        }
    }
}

fn print_banner() {
    println!();
    println!(
        "{}",
        format!(
            " scangate v{} — Starting CI/CD Security Scan",
            env!("CARGO_PKG_VERSION")
        )
        .bold()
    );
}

fn print_stage_header(stage: StageKind) {
    println!();
    println!(" {}", format!("--- {} ---", stage.title()).bold().underline());
}

fn print_command_output(outcome: &CommandOutcome) {
    if !outcome.stdout.is_empty() {
        println!("Stdout:");
        println!("{}", outcome.stdout);
    }
    if !outcome.stderr.is_empty() {
        println!("Stderr:");
        println!("{}", outcome.stderr);
    }
    println!(
        " {} {} in {}",
        "|-".dimmed(),
        outcome.state.to_string().dimmed(),
        format_elapsed(outcome.elapsed.as_millis() as u64).dimmed()
    );
}

fn outcome_tag(outcome: &StageOutcome) -> String {
    let label = format!(" {} ", outcome.symbol());
    match outcome {
        StageOutcome::Passed { .. } => label.on_green().black().bold().to_string(),
        StageOutcome::Failed { .. } => label.on_red().white().bold().to_string(),
        StageOutcome::Skipped { .. } => label.dimmed().to_string(),
    }
}

fn print_stage_outcome(stage: StageKind, outcome: &StageOutcome) {
    println!(" {} {}", outcome_tag(outcome), outcome.message());
    if outcome.is_failed() && !stage.halts_on_failure() {
        println!(
            "   {} {}",
            "|".dimmed(),
            "Scan failures are reported but do not fail the pipeline.".dimmed()
        );
    }
}

fn print_summary(run: &PipelineRun) {
    println!();
    println!(" {}", "=".repeat(60).dimmed());
    println!();
    println!(" {}", "Summary".bold().underline());
    for record in &run.stages {
        println!(
            " {} {:<20} {} ({})",
            "|-".dimmed(),
            record.stage.title(),
            outcome_tag(&record.outcome),
            format_elapsed(record.elapsed_ms)
        );
    }
    println!(
        " {} Total time: {}",
        "|-".dimmed(),
        format_elapsed(run.elapsed_ms)
    );
    println!();

    match run.verdict {
        Verdict::Passed => {
            println!(" {}", "--- CI/CD Security Scan Completed ---".green().bold());
        }
        Verdict::Failed { stage } => {
            println!(
                " {} {}",
                "FAILED".red().bold(),
                format!("Pipeline failed at {}.", stage.title()).bold()
            );
        }
    }
    println!();
}

/// Format milliseconds as `850ms`, `12.3s` or `4:05`.
fn format_elapsed(ms: u64) -> String {
    if ms < 1_000 {
        return format!("{}ms", ms);
    }
    let secs = ms as f64 / 1000.0;
    if secs < 60.0 {
        return format!("{:.1}s", secs);
    }
    let total_secs = secs.round() as u64;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}
