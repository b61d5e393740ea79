//! Sandboxed execution of external tools against generated artifacts.
//!
//! The executor runs one subprocess (test runner or vulnerability scanner)
//! against a target file under a hard wall-clock timeout, capturing combined
//! stdout and stderr. It never raises: every failure mode collapses into an
//! [`ExecOutcome`] classification so the workflow can decide how to proceed
//! and feed the captured output back into the loop as repair context.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

/// Default wall-clock bound for a single tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(10);

/// An external tool invocation template.
///
/// The target file path is appended as the final argument at execution time,
/// so the same template serves every cycle of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCommand {
    /// Program to invoke.
    pub program: String,
    /// Fixed arguments, before the target path.
    pub args: Vec<String>,
}

impl ToolCommand {
    /// Creates a command template with no fixed arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends a fixed argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Parses a shell-ish command string ("bandit -r -f txt") into a
    /// template. Whitespace splitting only; no quoting support.
    pub fn parse(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next()?;
        Some(Self {
            program: program.to_string(),
            args: parts.map(String::from).collect(),
        })
    }

    /// Wraps this command to run inside a named container via `docker exec`.
    ///
    /// Container and local execution are interchangeable strategies behind
    /// the same [`SandboxExecutor::execute`] contract; only the command
    /// template changes.
    pub fn in_container(self, container: &str) -> Self {
        let mut args = vec!["exec".to_string(), container.to_string(), self.program];
        args.extend(self.args);
        Self {
            program: "docker".to_string(),
            args,
        }
    }

    /// Command template for the default test runner.
    pub fn pytest() -> Self {
        Self::new("pytest")
    }

    /// Command template for the default vulnerability scanner.
    pub fn bandit() -> Self {
        Self::new("bandit")
            .with_arg("-r")
            .with_arg("-f")
            .with_arg("txt")
    }
}

impl std::fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Classification of a tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecStatus {
    /// Tool exited zero.
    Success,
    /// Tool ran to completion and exited nonzero (e.g. tests failed,
    /// findings reported). The captured output says why.
    Failed,
    /// Tool could not run to completion: timeout or execution failure.
    Error,
    /// Tool binary was not found on this host.
    ToolMissing,
}

/// Outcome of one tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecOutcome {
    /// Classification of the execution.
    pub status: ExecStatus,
    /// Combined stdout and stderr, or a diagnostic for error outcomes.
    pub output: String,
}

impl ExecOutcome {
    fn new(status: ExecStatus, output: impl Into<String>) -> Self {
        Self {
            status,
            output: output.into(),
        }
    }
}

/// Runs tool commands as isolated subprocesses with a hard timeout.
#[derive(Debug, Clone)]
pub struct SandboxExecutor {
    /// Working directory for tool subprocesses.
    workdir: PathBuf,
    /// Wall-clock bound per invocation.
    timeout: Duration,
}

impl SandboxExecutor {
    /// Creates an executor running tools inside the given working directory.
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Sets the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Executes a tool command against a target file.
    ///
    /// The subprocess is spawned with `kill_on_drop`, so expiry of the
    /// timeout tears the child down rather than leaving a runaway process
    /// behind.
    pub async fn execute(&self, command: &ToolCommand, target: &Path) -> ExecOutcome {
        debug!(command = %command, target = %target.display(), "Executing tool");

        let spawned = Command::new(&command.program)
            .args(&command.args)
            .arg(target)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match spawned {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(program = %command.program, "Tool binary not found");
                return ExecOutcome::new(
                    ExecStatus::ToolMissing,
                    format!("Tool '{}' not found", command.program),
                );
            }
            Err(e) => {
                return ExecOutcome::new(
                    ExecStatus::Error,
                    format!("Failed to spawn '{}': {}", command.program, e),
                );
            }
        };

        let waited = tokio::time::timeout(self.timeout, child.wait_with_output()).await;

        match waited {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let combined = format!("{}\n{}", stdout, stderr);

                if output.status.success() {
                    ExecOutcome::new(ExecStatus::Success, combined)
                } else {
                    debug!(code = ?output.status.code(), "Tool exited nonzero");
                    ExecOutcome::new(ExecStatus::Failed, combined)
                }
            }
            Ok(Err(e)) => ExecOutcome::new(
                ExecStatus::Error,
                format!("Failed to run '{}': {}", command.program, e),
            ),
            Err(_) => {
                warn!(command = %command, timeout = ?self.timeout, "Tool execution timed out");
                ExecOutcome::new(
                    ExecStatus::Error,
                    format!(
                        "Execution timed out after {}s (possible infinite loop)",
                        self.timeout.as_secs()
                    ),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn executor(temp: &TempDir) -> SandboxExecutor {
        SandboxExecutor::new(temp.path())
    }

    #[test]
    fn test_tool_command_display() {
        let cmd = ToolCommand::bandit();
        assert_eq!(cmd.to_string(), "bandit -r -f txt");
    }

    #[test]
    fn test_in_container_wraps_via_docker_exec() {
        let cmd = ToolCommand::pytest().in_container("devloop-runner");
        assert_eq!(cmd.program, "docker");
        assert_eq!(cmd.args, vec!["exec", "devloop-runner", "pytest"]);
        assert_eq!(cmd.to_string(), "docker exec devloop-runner pytest");
    }

    #[test]
    fn test_tool_command_parse() {
        let cmd = ToolCommand::parse("bandit -r -f txt").unwrap();
        assert_eq!(cmd.program, "bandit");
        assert_eq!(cmd.args, vec!["-r", "-f", "txt"]);

        assert!(ToolCommand::parse("   ").is_none());
    }

    #[tokio::test]
    async fn test_zero_exit_is_success() {
        let temp = TempDir::new().unwrap();
        let cmd = ToolCommand::new("sh").with_arg("-c").with_arg("echo ok");

        let outcome = executor(&temp).execute(&cmd, Path::new("target")).await;

        assert_eq!(outcome.status, ExecStatus::Success);
        assert!(outcome.output.contains("ok"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failed_with_output() {
        let temp = TempDir::new().unwrap();
        let cmd = ToolCommand::new("sh")
            .with_arg("-c")
            .with_arg("echo '1 test failed' >&2; exit 1");

        let outcome = executor(&temp).execute(&cmd, Path::new("target")).await;

        assert_eq!(outcome.status, ExecStatus::Failed);
        // Stderr must be captured so the Developer can read why.
        assert!(outcome.output.contains("1 test failed"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_tool_missing() {
        let temp = TempDir::new().unwrap();
        let cmd = ToolCommand::new("devloop-no-such-binary-xyz");

        let outcome = executor(&temp).execute(&cmd, Path::new("target")).await;

        assert_eq!(outcome.status, ExecStatus::ToolMissing);
        assert!(outcome.output.contains("not found"));
    }

    #[tokio::test]
    async fn test_timeout_is_error_with_diagnostic() {
        let temp = TempDir::new().unwrap();
        let cmd = ToolCommand::new("sleep");

        let outcome = executor(&temp)
            .with_timeout(Duration::from_millis(100))
            .execute(&cmd, Path::new("5"))
            .await;

        assert_eq!(outcome.status, ExecStatus::Error);
        assert!(outcome.output.contains("infinite loop"));
    }

    #[tokio::test]
    async fn test_target_appended_as_final_argument() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("target.txt"), "payload").unwrap();

        let cmd = ToolCommand::new("cat");
        let outcome = executor(&temp)
            .execute(&cmd, Path::new("target.txt"))
            .await;

        assert_eq!(outcome.status, ExecStatus::Success);
        assert!(outcome.output.contains("payload"));
    }
}
