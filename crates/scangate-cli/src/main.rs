mod display;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use scangate_core::{
    pipeline, GateConfig, GateError, MissingReportPolicy, NullObserver, PipelineRun,
    SystemRunner,
};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Exit code for configuration or usage problems; the pipeline never started.
const EXIT_USAGE: u8 = 2;

#[derive(Parser)]
#[command(
    name = "scangate",
    version,
    about = "scangate — CI/CD security gate for SonarQube and OWASP ZAP",
    long_about = "Run SonarQube static analysis and an OWASP ZAP active scan, then turn the results into a single pass/fail exit code.\n\n\
        Configuration comes from the environment:\n  \
        SONARQUBE_HOST, SONARQUBE_TOKEN, SONARQUBE_PROJECT_KEY, PROJECT_SOURCE_DIR, SONAR_SCANNER_BIN,\n  \
        ZAP_HOST, ZAP_PORT, TARGET_URL, ZAP_REPORT_PATH, ZAP_API_KEY, ZAP_CLI_BIN,\n  \
        SCANGATE_MISSING_REPORT, SCANGATE_COMMAND_TIMEOUT_SECS\n\n\
        Without SONARQUBE_TOKEN static analysis is skipped; without TARGET_URL the ZAP scan is skipped."
)]
struct Cli {
    /// Output format (text, json)
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// What to do when ZAP leaves no report behind (overrides SCANGATE_MISSING_REPORT)
    #[arg(long, value_enum)]
    missing_report: Option<ReportPolicyArg>,

    /// Kill any tool still running after this many seconds (overrides SCANGATE_COMMAND_TIMEOUT_SECS)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportPolicyArg {
    Pass,
    Fail,
}

impl From<ReportPolicyArg> for MissingReportPolicy {
    fn from(arg: ReportPolicyArg) -> Self {
        match arg {
            ReportPolicyArg::Pass => MissingReportPolicy::Pass,
            ReportPolicyArg::Fail => MissingReportPolicy::Fail,
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(error) => {
            eprintln!("{} {:#}", "error:".red().bold(), error);
            ExitCode::from(EXIT_USAGE)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<u8> {
    let mut config = GateConfig::from_env().context("Invalid scangate configuration")?;
    if let Some(policy) = cli.missing_report {
        config = config.with_missing_report(policy.into());
    }
    if let Some(secs) = cli.timeout_secs {
        config = config.with_command_timeout(Some(Duration::from_secs(secs)));
    }

    tracing::debug!(
        format = ?cli.format,
        missing_report = ?config.missing_report,
        timeout = ?config.command_timeout,
        "starting security gate"
    );

    let runner = SystemRunner::new(config.command_timeout);

    let code = match cli.format {
        OutputFormat::Text => {
            let mut console = display::ConsoleObserver::default();
            pipeline::run(&config, &runner, &mut console).exit_code()
        }
        OutputFormat::Json => {
            let outcome = pipeline::run(&config, &runner, &mut NullObserver);
            emit_json_summary(&outcome, outcome.to_json())
        }
    };

    Ok(code as u8)
}

/// Print the JSON summary and return the run's exit code. The pipeline already
/// ran, so a rendering failure is reported without replacing its verdict.
fn emit_json_summary(outcome: &PipelineRun, rendered: Result<String, GateError>) -> i32 {
    match rendered {
        Ok(json) => println!("{}", json),
        Err(error) => {
            eprintln!("{} Failed to render run summary: {}", "error:".red().bold(), error);
        }
    }
    outcome.exit_code()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scangate_core::{StageKind, Verdict};

    #[test]
    fn test_render_failure_keeps_pipeline_verdict() {
        let mut outcome = pipeline::run(
            &GateConfig::default(),
            &SystemRunner::default(),
            &mut NullObserver,
        );
        outcome.verdict = Verdict::Failed {
            stage: StageKind::ReportCheck,
        };

        let broken = serde_json::from_str::<u8>("not json").unwrap_err();
        assert_eq!(emit_json_summary(&outcome, Err(GateError::Serialize(broken))), 1);

        outcome.verdict = Verdict::Passed;
        let rendered = outcome.to_json();
        assert_eq!(emit_json_summary(&outcome, rendered), 0);
    }
}
