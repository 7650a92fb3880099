use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SONARQUBE_HOST: &str = "http://localhost:9000";
pub const DEFAULT_PROJECT_KEY: &str = "my-python-project";
pub const DEFAULT_SOURCE_DIR: &str = ".";
pub const DEFAULT_SCANNER_BIN: &str = "sonar-scanner";
pub const DEFAULT_ZAP_HOST: &str = "localhost";
pub const DEFAULT_ZAP_PORT: &str = "8080";
pub const DEFAULT_REPORT_PATH: &str = "zap_report.html";
pub const DEFAULT_ZAP_BIN: &str = "zap-cli";

/// Settings for the SonarQube static analysis stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticAnalysisConfig {
    pub host_url: String,
    /// Absent means the stage is skipped.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub project_key: String,
    pub source_dir: PathBuf,
    pub scanner_bin: String,
}

/// Settings for the OWASP ZAP dynamic scan and report check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicScanConfig {
    /// Not passed to the scanner; kept so the run summary shows the proxy in use.
    pub proxy_host: String,
    pub proxy_port: String,
    /// Absent means the whole dynamic stage is skipped.
    #[serde(serialize_with = "crate::redact::serialize_redacted_url")]
    pub target_url: Option<String>,
    pub report_path: PathBuf,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub zap_bin: String,
}

/// What the report check does when the scanner left no report behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingReportPolicy {
    #[default]
    Pass,
    Fail,
}

impl MissingReportPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pass" => Some(MissingReportPolicy::Pass),
            "fail" => Some(MissingReportPolicy::Fail),
            _ => None,
        }
    }
}

/// Immutable configuration for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    pub static_analysis: StaticAnalysisConfig,
    pub dynamic_scan: DynamicScanConfig,
    #[serde(default)]
    pub missing_report: MissingReportPolicy,
    /// `None` waits on each tool indefinitely.
    pub command_timeout: Option<Duration>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            static_analysis: StaticAnalysisConfig {
                host_url: DEFAULT_SONARQUBE_HOST.to_string(),
                token: None,
                project_key: DEFAULT_PROJECT_KEY.to_string(),
                source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
                scanner_bin: DEFAULT_SCANNER_BIN.to_string(),
            },
            dynamic_scan: DynamicScanConfig {
                proxy_host: DEFAULT_ZAP_HOST.to_string(),
                proxy_port: DEFAULT_ZAP_PORT.to_string(),
                target_url: None,
                report_path: PathBuf::from(DEFAULT_REPORT_PATH),
                api_key: None,
                zap_bin: DEFAULT_ZAP_BIN.to_string(),
            },
            missing_report: MissingReportPolicy::default(),
            command_timeout: None,
        }
    }
}

impl GateConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Variables that are set but empty count as unset, so `SONARQUBE_TOKEN=""`
    /// skips static analysis just like an absent token.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let or_default = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let missing_report = match get("SCANGATE_MISSING_REPORT") {
            Some(raw) => MissingReportPolicy::parse(&raw).ok_or_else(|| GateError::InvalidConfig {
                name: "SCANGATE_MISSING_REPORT",
                value: raw.clone(),
                reason: "expected 'pass' or 'fail'".to_string(),
            })?,
            None => MissingReportPolicy::default(),
        };

        let command_timeout = match get("SCANGATE_COMMAND_TIMEOUT_SECS") {
            Some(raw) => Some(parse_timeout_secs("SCANGATE_COMMAND_TIMEOUT_SECS", &raw)?),
            None => None,
        };

        let config = Self {
            static_analysis: StaticAnalysisConfig {
                host_url: or_default("SONARQUBE_HOST", DEFAULT_SONARQUBE_HOST),
                token: get("SONARQUBE_TOKEN"),
                project_key: or_default("SONARQUBE_PROJECT_KEY", DEFAULT_PROJECT_KEY),
                source_dir: PathBuf::from(or_default("PROJECT_SOURCE_DIR", DEFAULT_SOURCE_DIR)),
                scanner_bin: or_default("SONAR_SCANNER_BIN", DEFAULT_SCANNER_BIN),
            },
            dynamic_scan: DynamicScanConfig {
                proxy_host: or_default("ZAP_HOST", DEFAULT_ZAP_HOST),
                proxy_port: or_default("ZAP_PORT", DEFAULT_ZAP_PORT),
                target_url: get("TARGET_URL"),
                report_path: PathBuf::from(or_default("ZAP_REPORT_PATH", DEFAULT_REPORT_PATH)),
                api_key: get("ZAP_API_KEY"),
                zap_bin: or_default("ZAP_CLI_BIN", DEFAULT_ZAP_BIN),
            },
            missing_report,
            command_timeout,
        };

        tracing::debug!(
            static_enabled = config.static_analysis.token.is_some(),
            dynamic_enabled = config.dynamic_scan.target_url.is_some(),
            missing_report = ?config.missing_report,
            timeout = ?config.command_timeout,
            "resolved gate configuration"
        );

        Ok(config)
    }

    pub fn with_missing_report(mut self, policy: MissingReportPolicy) -> Self {
        self.missing_report = policy;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// Parse a whole number of seconds; zero is rejected because it would kill every tool.
pub fn parse_timeout_secs(name: &'static str, raw: &str) -> Result<Duration> {
    let secs: u64 = raw.trim().parse().map_err(|_| GateError::InvalidConfig {
        name,
        value: raw.to_string(),
        reason: "expected a whole number of seconds".to_string(),
    })?;
    if secs == 0 {
        return Err(GateError::InvalidConfig {
            name,
            value: raw.to_string(),
            reason: "timeout must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}
