//! Error types for devloop operations.
//!
//! Defines error types for the two subsystems that can fail in ways the
//! caller must distinguish:
//! - Generation backend interactions (`LlmError`)
//! - Workflow execution (`WorkflowError`)
//!
//! Sandbox execution deliberately has no error type: the executor folds every
//! failure mode into an [`ExecOutcome`](crate::sandbox::ExecOutcome) so the
//! loop can feed diagnostics back to the Developer node as repair context.

use thiserror::Error;

/// Errors that can occur during generation backend operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: generation backend is disabled")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse backend response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that abort a workflow run.
///
/// Node-level generation failures are *not* represented here: a node that
/// hits an [`LlmError`] degrades to a diagnostic log line and the run
/// continues (the iteration cap eventually halts it). Anything that surfaces
/// as a `WorkflowError` terminates the event stream.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Failed to materialize artifact '{slot}': {source}")]
    Artifact {
        slot: String,
        #[source]
        source: std::io::Error,
    },
}
