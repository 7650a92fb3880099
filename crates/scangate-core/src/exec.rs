use crate::events::{Observer, PipelineEvent};
use crate::redact::redact_argument;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A program plus its arguments. Always has a program, so never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The command line joined with single spaces, as echoed before execution.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Like [`display`](Self::display), with each argument masked separately.
    pub fn redacted_display(&self) -> String {
        std::iter::once(redact_argument(&self.program))
            .chain(self.args.iter().map(|arg| redact_argument(arg)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a child process ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExitState {
    Exited { code: i32 },
    Signaled { signal: Option<i32> },
    SpawnFailed { reason: String },
    WaitFailed { reason: String },
    TimedOut { limit_ms: u64 },
}

impl ExitState {
    fn from_status(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => ExitState::Exited { code },
            None => ExitState::Signaled {
                signal: termination_signal(status),
            },
        }
    }
}

#[cfg(unix)]
fn termination_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn termination_signal(_status: ExitStatus) -> Option<i32> {
    None
}

impl fmt::Display for ExitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitState::Exited { code } => write!(f, "exit code {code}"),
            ExitState::Signaled { signal: Some(signal) } => write!(f, "killed by signal {signal}"),
            ExitState::Signaled { signal: None } => write!(f, "terminated by signal"),
            ExitState::SpawnFailed { reason } => write!(f, "could not start: {reason}"),
            ExitState::WaitFailed { reason } => write!(f, "lost track of process: {reason}"),
            ExitState::TimedOut { limit_ms } => write!(f, "timed out after {}", format_limit(*limit_ms)),
        }
    }
}

fn format_limit(ms: u64) -> String {
    if ms < 1_000 {
        format!("{ms}ms")
    } else if ms % 1_000 == 0 {
        format!("{}s", ms / 1_000)
    } else {
        format!("{:.1}s", ms as f64 / 1_000.0)
    }
}

/// Result of a single program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub state: ExitState,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl CommandOutcome {
    /// Only a clean zero exit counts as success.
    pub fn success(&self) -> bool {
        matches!(self.state, ExitState::Exited { code: 0 })
    }

    pub fn exited(code: i32) -> Self {
        Self {
            state: ExitState::Exited { code },
            stdout: String::new(),
            stderr: String::new(),
            elapsed: Duration::ZERO,
        }
    }
}

/// Runs external programs. The pipeline only ever talks to tools through this.
pub trait CommandRunner {
    fn run(&self, spec: &CommandSpec) -> CommandOutcome;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> CommandOutcome {
        let started = Instant::now();

        let spawned = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(error) => {
                tracing::warn!(program = %spec.program, %error, "failed to spawn tool");
                return CommandOutcome {
                    state: ExitState::SpawnFailed {
                        reason: format!("'{}': {}", spec.program, error),
                    },
                    stdout: String::new(),
                    stderr: String::new(),
                    elapsed: started.elapsed(),
                };
            }
        };

        tracing::debug!(program = %spec.program, pid = child.id(), "spawned tool");

        // Drain both pipes while waiting so a chatty child never blocks on a full buffer.
        let stdout_reader = child.stdout.take().map(drain);
        let stderr_reader = child.stderr.take().map(drain);

        let waited = match self.timeout {
            Some(limit) => wait_with_deadline(&mut child, limit),
            None => child.wait().map(Some),
        };

        let stdout = collect(stdout_reader);
        let stderr = collect(stderr_reader);

        let state = match waited {
            Ok(Some(status)) => ExitState::from_status(status),
            Ok(None) => ExitState::TimedOut {
                limit_ms: self
                    .timeout
                    .map(|limit| limit.as_millis() as u64)
                    .unwrap_or_default(),
            },
            Err(error) => ExitState::WaitFailed {
                reason: error.to_string(),
            },
        };

        let elapsed = started.elapsed();
        tracing::debug!(
            program = %spec.program,
            state = %state,
            elapsed_ms = elapsed.as_millis() as u64,
            "tool finished"
        );

        CommandOutcome {
            state,
            stdout,
            stderr,
            elapsed,
        }
    }
}

/// Poll until the child exits or `limit` passes. `Ok(None)` means it was killed.
fn wait_with_deadline(child: &mut Child, limit: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            tracing::warn!(pid = child.id(), limit_secs = limit.as_secs(), "tool timed out, killing it");
            // The child may have exited between try_wait and kill.
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Run one command, reporting the (redacted) command line and its captured output.
pub fn execute(
    runner: &dyn CommandRunner,
    spec: &CommandSpec,
    observer: &mut dyn Observer,
) -> CommandOutcome {
    let command_line = spec.redacted_display();
    observer.on_event(&PipelineEvent::CommandStarted {
        command_line: &command_line,
    });

    let outcome = runner.run(spec);

    observer.on_event(&PipelineEvent::CommandFinished { outcome: &outcome });
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_with_spaces() {
        let spec = CommandSpec::new("zap-cli")
            .arg("active-scan")
            .arg("-t")
            .arg("http://x");
        assert_eq!(spec.display(), "zap-cli active-scan -t http://x");
        assert_eq!(spec.program(), "zap-cli");
        assert_eq!(spec.args().len(), 3);
    }

    #[test]
    fn test_redacted_display_masks_whole_arguments() {
        let spec = CommandSpec::new("sonar-scanner")
            .arg("-Dsonar.projectKey=app")
            .arg("-Dsonar.login=abc secretpart");
        let shown = spec.redacted_display();
        assert_eq!(shown, "sonar-scanner -Dsonar.projectKey=app -Dsonar.login=***");
        assert!(!shown.contains("secretpart"));
    }

    #[test]
    fn test_timed_out_display_keeps_sub_second_limits() {
        assert_eq!(
            ExitState::TimedOut { limit_ms: 200 }.to_string(),
            "timed out after 200ms"
        );
        assert_eq!(
            ExitState::TimedOut { limit_ms: 30_000 }.to_string(),
            "timed out after 30s"
        );
        assert_eq!(
            ExitState::TimedOut { limit_ms: 1_500 }.to_string(),
            "timed out after 1.5s"
        );
    }

    #[test]
    fn test_only_zero_exit_is_success() {
        assert!(CommandOutcome::exited(0).success());
        assert!(!CommandOutcome::exited(1).success());
        assert!(!CommandOutcome::exited(-1).success());

        let signaled = CommandOutcome {
            state: ExitState::Signaled { signal: Some(9) },
            ..CommandOutcome::exited(0)
        };
        assert!(!signaled.success());
    }

    #[test]
    fn test_missing_program_is_failure_not_error() {
        let runner = SystemRunner::default();
        let outcome = runner.run(&CommandSpec::new("/this/does/not/exist"));
        assert!(!outcome.success());
        assert!(matches!(outcome.state, ExitState::SpawnFailed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_stdout_stderr_and_exit_code() {
        let runner = SystemRunner::default();
        let spec = CommandSpec::new("sh")
            .arg("-c")
            .arg("echo out; echo err >&2; exit 3");
        let outcome = runner.run(&spec);
        assert_eq!(outcome.state, ExitState::Exited { code: 3 });
        assert_eq!(outcome.stdout.trim(), "out");
        assert_eq!(outcome.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[test]
    fn test_large_output_is_not_truncated() {
        let runner = SystemRunner::default();
        let spec = CommandSpec::new("sh")
            .arg("-c")
            .arg("i=0; while [ $i -lt 20000 ]; do echo line-$i; i=$((i+1)); done");
        let outcome = runner.run(&spec);
        assert!(outcome.success());
        assert_eq!(outcome.stdout.lines().count(), 20000);
        assert_eq!(outcome.stdout.lines().last(), Some("line-19999"));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_hung_tool() {
        let runner = SystemRunner::new(Some(Duration::from_millis(200)));
        let outcome = runner.run(&CommandSpec::new("sleep").arg("5"));
        assert_eq!(outcome.state, ExitState::TimedOut { limit_ms: 200 });
        assert!(!outcome.success());
        assert!(outcome.elapsed < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_signal_termination_is_failure() {
        let runner = SystemRunner::default();
        let outcome = runner.run(&CommandSpec::new("sh").arg("-c").arg("kill -9 $$"));
        assert_eq!(outcome.state, ExitState::Signaled { signal: Some(9) });
        assert!(!outcome.success());
    }
}
