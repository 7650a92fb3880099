use crate::config::DynamicScanConfig;
use crate::events::{Observer, PipelineEvent};
use crate::exec::{self, CommandRunner, CommandSpec};
use crate::stages::StageOutcome;

pub const SCAN_VERB: &str = "active-scan";

/// Build the `zap-cli active-scan` invocation against `target`.
pub fn build_command(config: &DynamicScanConfig, target: &str) -> CommandSpec {
    let spec = CommandSpec::new(&config.zap_bin)
        .arg(SCAN_VERB)
        .arg("-t")
        .arg(target)
        .arg("-r")
        .arg(config.report_path.display().to_string());

    match config.api_key.as_deref() {
        Some(key) => spec.arg("-z").arg(format!("-config api.key={key}")),
        None => spec,
    }
}

/// Run the ZAP active scan. Unauthenticated scans still run, with a warning.
pub fn run(
    config: &DynamicScanConfig,
    target: &str,
    runner: &dyn CommandRunner,
    observer: &mut dyn Observer,
) -> StageOutcome {
    if config.api_key.is_none() {
        observer.on_event(&PipelineEvent::Warning {
            message: "ZAP API key not set. Consider setting ZAP_API_KEY for secure operation.",
        });
    }

    let outcome = exec::execute(runner, &build_command(config, target), observer);
    if outcome.success() {
        StageOutcome::passed(format!(
            "OWASP ZAP scan completed. Report saved to: {}",
            config.report_path.display()
        ))
    } else {
        StageOutcome::failed(format!("OWASP ZAP scan failed ({}).", outcome.state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GateConfig;
    use crate::events::PipelineEvent;
    use crate::exec::CommandOutcome;

    struct Fixed(i32);

    impl CommandRunner for Fixed {
        fn run(&self, _spec: &CommandSpec) -> CommandOutcome {
            CommandOutcome::exited(self.0)
        }
    }

    #[derive(Default)]
    struct Warnings(Vec<String>);

    impl Observer for Warnings {
        fn on_event(&mut self, event: &PipelineEvent<'_>) {
            if let PipelineEvent::Warning { message } = event {
                self.0.push(message.to_string());
            }
        }
    }

    #[test]
    fn test_command_without_api_key() {
        let config = GateConfig::default().dynamic_scan;
        let spec = build_command(&config, "http://x");
        assert_eq!(spec.display(), "zap-cli active-scan -t http://x -r zap_report.html");
    }

    #[test]
    fn test_api_key_is_appended_as_single_config_argument() {
        let mut config = GateConfig::default().dynamic_scan;
        config.api_key = Some("k3y".to_string());
        let spec = build_command(&config, "http://x");
        let args = spec.args();
        assert_eq!(args[args.len() - 2], "-z");
        assert_eq!(args[args.len() - 1], "-config api.key=k3y");
    }

    #[test]
    fn test_warns_when_api_key_missing_but_still_scans() {
        let config = GateConfig::default().dynamic_scan;
        let mut warnings = Warnings::default();
        let outcome = run(&config, "http://x", &Fixed(0), &mut warnings);
        assert!(!outcome.is_failed());
        assert_eq!(warnings.0.len(), 1);
        assert!(warnings.0[0].contains("ZAP API key not set"));
    }

    #[test]
    fn test_no_warning_with_api_key() {
        let mut config = GateConfig::default().dynamic_scan;
        config.api_key = Some("k3y".to_string());
        let mut warnings = Warnings::default();
        run(&config, "http://x", &Fixed(0), &mut warnings);
        assert!(warnings.0.is_empty());
    }

    #[test]
    fn test_scan_failure_is_reported() {
        let config = GateConfig::default().dynamic_scan;
        let outcome = run(&config, "http://x", &Fixed(1), &mut Warnings::default());
        assert!(outcome.is_failed());
        assert!(outcome.message().starts_with("OWASP ZAP scan failed"));
    }
}
