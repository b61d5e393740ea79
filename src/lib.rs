//! devloop: autonomous code-generation loop orchestrator.
//!
//! Given a natural-language objective, devloop drives a cyclic sequence of
//! LLM-backed steps: design tests, write code, scan for vulnerabilities,
//! run the tests, then decide whether to retry. The loop ends when the code
//! passes its tests with no flagged vulnerabilities, or when the retry
//! budget is exhausted.

pub mod artifacts;
pub mod cli;
pub mod error;
pub mod llm;
pub mod prompts;
pub mod sandbox;
pub mod workflow;

// Re-export commonly used error types
pub use error::{LlmError, WorkflowError};
