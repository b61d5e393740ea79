//! Loop controller: the conditional edge after the Tester node.

use tracing::debug;

use super::state::{RunStatus, WorkflowState};

/// Decision taken after each Tester execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Terminate the run.
    Stop,
    /// Re-enter the Developer node with accumulated feedback.
    Retry,
}

/// Chooses whether to stop the loop or retry via the Developer node.
///
/// Stops when the tests pass and the scan classification is clean (a skipped
/// scan counts as clean), or unconditionally once `iterations` exceeds
/// `max_iterations` regardless of status: the safety valve against infinite
/// loops and runaway backend cost.
pub fn decide(state: &WorkflowState, max_iterations: u32) -> Decision {
    if state.status == RunStatus::Success && state.security_scan.is_clean() {
        debug!(iterations = state.iterations, "Tests pass and scan is clean");
        return Decision::Stop;
    }

    if state.iterations > max_iterations {
        debug!(
            iterations = state.iterations,
            max_iterations, "Iteration cap reached"
        );
        return Decision::Stop;
    }

    Decision::Retry
}
