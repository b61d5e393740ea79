//! Configuration for a workflow run.

use std::path::PathBuf;
use std::time::Duration;

use crate::sandbox::{ToolCommand, DEFAULT_TOOL_TIMEOUT};

/// Default cap on Developer cycles; the router stops unconditionally once
/// `iterations` exceeds it.
pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// Configuration for one workflow run.
///
/// Passed explicitly into the engine; there is no ambient global
/// configuration anywhere in the crate.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Model identifier for generation requests; empty means the client's
    /// default.
    pub model: String,
    /// Sampling temperature; pinned to zero for reproducible codegen.
    pub temperature: f64,
    /// Safety valve on Developer cycles.
    pub max_iterations: u32,
    /// Wall-clock bound per tool invocation.
    pub tool_timeout: Duration,
    /// Workspace directory holding the artifact slots.
    pub workspace: PathBuf,
    /// Test-runner command template (target test file appended).
    pub test_command: ToolCommand,
    /// Vulnerability-scanner command template (target source appended).
    pub scan_command: ToolCommand,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: 0.0,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            workspace: PathBuf::from("."),
            test_command: ToolCommand::pytest(),
            scan_command: ToolCommand::bandit(),
        }
    }
}

impl WorkflowConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the per-tool timeout.
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Sets the workspace directory.
    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = workspace.into();
        self
    }

    /// Sets the test-runner command template.
    pub fn with_test_command(mut self, command: ToolCommand) -> Self {
        self.test_command = command;
        self
    }

    /// Sets the scanner command template.
    pub fn with_scan_command(mut self, command: ToolCommand) -> Self {
        self.scan_command = command;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkflowConfig::default();
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.tool_timeout, Duration::from_secs(10));
        assert_eq!(config.test_command.program, "pytest");
        assert_eq!(config.scan_command.program, "bandit");
    }

    #[test]
    fn test_builder() {
        let config = WorkflowConfig::new()
            .with_model("google/gemini-2.5-flash")
            .with_max_iterations(2)
            .with_workspace("/tmp/run")
            .with_test_command(ToolCommand::new("cargo").with_arg("test"));

        assert_eq!(config.model, "google/gemini-2.5-flash");
        assert_eq!(config.max_iterations, 2);
        assert_eq!(config.workspace, PathBuf::from("/tmp/run"));
        assert_eq!(config.test_command.program, "cargo");
    }
}
