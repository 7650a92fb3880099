use crate::config::StaticAnalysisConfig;
use crate::events::Observer;
use crate::exec::{self, CommandRunner, CommandSpec};
use crate::stages::StageOutcome;

/// Build the `sonar-scanner` invocation for the given token.
pub fn build_command(config: &StaticAnalysisConfig, token: &str) -> CommandSpec {
    CommandSpec::new(&config.scanner_bin)
        .arg(format!("-Dsonar.projectKey={}", config.project_key))
        .arg(format!("-Dsonar.sources={}", config.source_dir.display()))
        .arg(format!("-Dsonar.host.url={}", config.host_url))
        .arg(format!("-Dsonar.login={token}"))
}

/// Run SonarQube static analysis, or skip it when no token is configured.
pub fn run(
    config: &StaticAnalysisConfig,
    runner: &dyn CommandRunner,
    observer: &mut dyn Observer,
) -> StageOutcome {
    let Some(token) = config.token.as_deref() else {
        return StageOutcome::skipped(
            "SONARQUBE_TOKEN environment variable not set. Skipping SonarQube analysis.",
        );
    };

    let outcome = exec::execute(runner, &build_command(config, token), observer);
    if outcome.success() {
        StageOutcome::passed("SonarQube analysis completed successfully.")
    } else {
        StageOutcome::failed(format!(
            "SonarQube analysis failed ({}). Failing the pipeline.",
            outcome.state
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GateConfig;
    use crate::events::NullObserver;
    use crate::exec::CommandOutcome;
    use std::cell::RefCell;

    struct Recorder {
        code: i32,
        calls: RefCell<Vec<CommandSpec>>,
    }

    impl CommandRunner for Recorder {
        fn run(&self, spec: &CommandSpec) -> CommandOutcome {
            self.calls.borrow_mut().push(spec.clone());
            CommandOutcome::exited(self.code)
        }
    }

    fn recorder(code: i32) -> Recorder {
        Recorder {
            code,
            calls: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn test_command_carries_four_parameters() {
        let mut config = GateConfig::default().static_analysis;
        config.project_key = "billing".to_string();
        let spec = build_command(&config, "abc");
        assert_eq!(spec.program(), "sonar-scanner");
        assert_eq!(
            spec.args(),
            &[
                "-Dsonar.projectKey=billing".to_string(),
                "-Dsonar.sources=.".to_string(),
                "-Dsonar.host.url=http://localhost:9000".to_string(),
                "-Dsonar.login=abc".to_string(),
            ]
        );
    }

    #[test]
    fn test_token_with_whitespace_never_shown() {
        let config = GateConfig::default().static_analysis;
        let shown = build_command(&config, "abc secretpart").redacted_display();
        assert!(shown.ends_with("-Dsonar.login=***"));
        assert!(!shown.contains("secretpart"));
    }

    #[test]
    fn test_skipped_without_token() {
        let config = GateConfig::default().static_analysis;
        let runner = recorder(1);
        let outcome = run(&config, &runner, &mut NullObserver);
        assert!(outcome.is_skipped());
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn test_outcome_mirrors_exit_code() {
        let mut config = GateConfig::default().static_analysis;
        config.token = Some("abc".to_string());

        let outcome = run(&config, &recorder(0), &mut NullObserver);
        assert_eq!(outcome, StageOutcome::passed("SonarQube analysis completed successfully."));

        let outcome = run(&config, &recorder(2), &mut NullObserver);
        assert!(outcome.is_failed());
        assert!(outcome.message().contains("exit code 2"));
    }
}
