//! The four workflow nodes: Architect, Developer, Security, Tester.
//!
//! Each node is a pure function of the cumulative state to a [`StateDelta`],
//! apart from its external side effects (backend call, artifact write,
//! subprocess). Generation failures degrade to a diagnostic log line inside
//! the node; only infrastructure failures (artifact writes) propagate and
//! abort the run.

use std::sync::Arc;

use tracing::{info, warn};

use super::config::WorkflowConfig;
use super::state::{RunStatus, ScanOutcome, StateDelta, WorkflowState};
use crate::artifacts::{ArtifactStore, CODE_SLOT, TEST_SLOT};
use crate::error::{LlmError, WorkflowError};
use crate::llm::{GenerationRequest, LlmProvider, Message};
use crate::prompts;
use crate::sandbox::{ExecStatus, SandboxExecutor};

/// Collaborators shared by every node of one run.
pub struct NodeContext {
    /// Generation backend.
    pub llm: Arc<dyn LlmProvider>,
    /// Tool executor, bound to the run's workspace.
    pub executor: SandboxExecutor,
    /// Artifact store, rooted at the run's workspace.
    pub artifacts: ArtifactStore,
    /// Run configuration.
    pub config: WorkflowConfig,
}

impl NodeContext {
    /// Wires up a context from a configuration and a backend provider.
    pub fn new(config: WorkflowConfig, llm: Arc<dyn LlmProvider>) -> Self {
        let executor = SandboxExecutor::new(&config.workspace).with_timeout(config.tool_timeout);
        let artifacts = ArtifactStore::new(&config.workspace);
        Self {
            llm,
            executor,
            artifacts,
            config,
        }
    }

    /// Sends one prompt to the backend and returns normalized plain text.
    async fn generate(&self, system: String, user: String) -> Result<String, LlmError> {
        let request = GenerationRequest::new(
            self.config.model.clone(),
            vec![Message::system(system), Message::user(user)],
        )
        .with_temperature(self.config.temperature);

        let response = self.llm.generate(request).await?;
        response.normalized_content()
    }
}

/// Persists an artifact slot, mapping failures to the aborting error.
fn materialize(ctx: &NodeContext, slot: &str, content: &str) -> Result<(), WorkflowError> {
    ctx.artifacts
        .save(slot, content)
        .map(|_| ())
        .map_err(|source| WorkflowError::Artifact {
            slot: slot.to_string(),
            source,
        })
}

/// Architect: designs the unit tests for the objective.
///
/// Runs exactly once, first; resets the iteration counter. On generation
/// failure the run continues with empty `test_content` and a diagnostic log.
pub async fn architect(
    ctx: &NodeContext,
    state: &WorkflowState,
) -> Result<StateDelta, WorkflowError> {
    let log = "[ARCHITECT] Designing tests...".to_string();
    info!(objective = %state.objective, "Architect designing tests");

    let (system, user) = prompts::architect_prompt(&state.objective);
    let tests = match ctx.generate(system, user).await {
        Ok(tests) => tests,
        Err(e) => {
            warn!(error = %e, "Architect generation failed");
            return Ok(StateDelta::logs_only(vec![format!(
                "[ARCHITECT] Test design unavailable: {e}"
            )]));
        }
    };

    materialize(ctx, TEST_SLOT, &tests)?;

    Ok(StateDelta {
        test_content: Some(tests),
        iterations: Some(0),
        logs: vec![log],
        ..StateDelta::default()
    })
}

/// Developer: writes or repairs the candidate solution.
///
/// Feedback from the previous cycle (test failures and security findings,
/// concatenated into one block) shapes the prompt. Increments the iteration
/// counter only when generation succeeds.
pub async fn developer(
    ctx: &NodeContext,
    state: &WorkflowState,
) -> Result<StateDelta, WorkflowError> {
    let cycle = state.iterations + 1;
    let log = format!("[DEVELOPER] Coding (cycle {cycle})...");
    info!(cycle, "Developer writing code");

    let feedback = prompts::feedback_context(
        &state.test_output,
        &state.security_report,
        state.security_scan == ScanOutcome::Findings,
    );
    let (system, user) = prompts::developer_prompt(&state.objective, &feedback);

    let code = match ctx.generate(system, user).await {
        Ok(code) => code,
        Err(e) => {
            warn!(error = %e, cycle, "Developer generation failed");
            return Ok(StateDelta::logs_only(vec![format!(
                "[DEVELOPER] Code generation unavailable: {e}"
            )]));
        }
    };

    materialize(ctx, CODE_SLOT, &code)?;

    Ok(StateDelta {
        code_content: Some(code),
        iterations: Some(cycle),
        logs: vec![log],
        ..StateDelta::default()
    })
}

/// Security: scans the materialized solution for vulnerabilities.
///
/// Classification is by exit status alone: zero means clean, nonzero means
/// findings (raw tool output embedded verbatim for the Developer's next
/// cycle). A missing or broken scanner yields `Skipped`, which never blocks
/// the loop from stopping.
pub async fn security(
    ctx: &NodeContext,
    _state: &WorkflowState,
) -> Result<StateDelta, WorkflowError> {
    let log = "[SECURITY] Scanning for vulnerabilities...".to_string();
    info!(command = %ctx.config.scan_command, "Security scan starting");

    let target = ctx.artifacts.path(CODE_SLOT);
    let outcome = ctx.executor.execute(&ctx.config.scan_command, &target).await;

    let (scan, report) = match outcome.status {
        ExecStatus::Success => (ScanOutcome::Clean, "No issues identified.".to_string()),
        ExecStatus::Failed => (
            ScanOutcome::Findings,
            format!("Issues found:\n{}", outcome.output),
        ),
        ExecStatus::ToolMissing => {
            warn!("Scanner unavailable, skipping scan");
            (
                ScanOutcome::Skipped,
                format!("Scanner unavailable, skipping. {}", outcome.output),
            )
        }
        ExecStatus::Error => {
            warn!(output = %outcome.output, "Scan did not complete");
            (
                ScanOutcome::Skipped,
                format!("Scan did not complete, skipping. {}", outcome.output),
            )
        }
    };

    Ok(StateDelta {
        security_report: Some(report),
        security_scan: Some(scan),
        logs: vec![log],
        ..StateDelta::default()
    })
}

/// Tester: executes the generated tests against the generated code.
///
/// The only node that writes `status`. Emits two log lines: the step start
/// and the verdict.
pub async fn tester(
    ctx: &NodeContext,
    _state: &WorkflowState,
) -> Result<StateDelta, WorkflowError> {
    let log = "[TESTER] Running unit tests...".to_string();
    info!(command = %ctx.config.test_command, "Test run starting");

    let target = ctx.artifacts.path(TEST_SLOT);
    let outcome = ctx.executor.execute(&ctx.config.test_command, &target).await;

    let (status, verdict) = match outcome.status {
        ExecStatus::Success => (RunStatus::Success, "[TESTER] Tests passed.".to_string()),
        ExecStatus::Failed => (RunStatus::Failed, "[TESTER] Tests failed.".to_string()),
        ExecStatus::Error | ExecStatus::ToolMissing => (
            RunStatus::Error,
            format!("[TESTER] Test run did not complete: {}", outcome.output),
        ),
    };

    Ok(StateDelta {
        test_output: Some(outcome.output),
        status: Some(status),
        logs: vec![log, verdict],
        ..StateDelta::default()
    })
}
