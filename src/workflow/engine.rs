//! The workflow engine: a five-node state machine with one conditional edge.
//!
//! Transition graph:
//!
//! ```text
//! architect -> developer -> security -> tester -> (router) -> developer
//!                                                          -> end
//! ```
//!
//! [`WorkflowEngine::run`] produces a lazy, finite, non-restartable stream of
//! [`StepEvent`]s, one per node execution. The engine merges each node's
//! delta into its authoritative state *before* the router or the next node
//! runs; a caller applying the streamed deltas in order reconstructs the
//! same cumulative view.

use std::sync::Arc;

use async_stream::stream;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::config::WorkflowConfig;
use super::nodes::{self, NodeContext};
use super::router::{self, Decision};
use super::state::{StateDelta, WorkflowState};
use crate::error::WorkflowError;
use crate::llm::LlmProvider;

/// The nodes of the state machine (the terminal "end" state is represented
/// by stream exhaustion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Architect,
    Developer,
    Security,
    Tester,
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Node::Architect => "architect",
            Node::Developer => "developer",
            Node::Security => "security",
            Node::Tester => "tester",
        };
        write!(f, "{}", name)
    }
}

/// One element of the run's event stream: which node executed and what it
/// changed.
#[derive(Debug, Clone, Serialize)]
pub struct StepEvent {
    /// Node that produced this delta.
    pub node: Node,
    /// The node's partial state update.
    pub delta: StateDelta,
    /// When the node finished.
    pub at: DateTime<Utc>,
}

impl StepEvent {
    fn new(node: Node, delta: StateDelta) -> Self {
        Self {
            node,
            delta,
            at: Utc::now(),
        }
    }
}

/// Drives one run of the code-generation loop.
pub struct WorkflowEngine {
    ctx: NodeContext,
    run_id: String,
}

impl WorkflowEngine {
    /// Creates an engine for one run.
    pub fn new(config: WorkflowConfig, llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            ctx: NodeContext::new(config, llm),
            run_id: format!("run-{}", Uuid::new_v4()),
        }
    }

    /// Returns this run's identifier.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Executes one node against the current state.
    async fn dispatch(
        &self,
        node: Node,
        state: &WorkflowState,
    ) -> Result<StateDelta, WorkflowError> {
        match node {
            Node::Architect => nodes::architect(&self.ctx, state).await,
            Node::Developer => nodes::developer(&self.ctx, state).await,
            Node::Security => nodes::security(&self.ctx, state).await,
            Node::Tester => nodes::tester(&self.ctx, state).await,
        }
    }

    /// Runs the workflow, yielding one event per node execution.
    ///
    /// An `Err` element means a node failed in a way the engine does not
    /// recover from; the stream terminates immediately after and the caller
    /// must treat the run as aborted. Deltas are committed only after a node
    /// returns successfully, so an aborted run leaves no partially-applied
    /// state behind.
    pub fn run(
        &self,
        initial: WorkflowState,
    ) -> impl Stream<Item = Result<StepEvent, WorkflowError>> + '_ {
        stream! {
            let mut state = initial;
            info!(run_id = %self.run_id, objective = %state.objective, "Workflow run starting");

            // Architect runs exactly once, first.
            match self.dispatch(Node::Architect, &state).await {
                Ok(delta) => {
                    state.apply(&delta);
                    yield Ok(StepEvent::new(Node::Architect, delta));
                }
                Err(e) => {
                    error!(run_id = %self.run_id, node = %Node::Architect, error = %e, "Node failed, aborting run");
                    yield Err(e);
                    return;
                }
            }

            // Counts developer->tester passes independently of the state's
            // iteration field, which does not advance when the Developer node
            // degrades (e.g. disabled backend). Guards such runs against
            // looping forever below.
            let mut cycles = 0u32;

            loop {
                cycles += 1;
                for node in [Node::Developer, Node::Security, Node::Tester] {
                    match self.dispatch(node, &state).await {
                        Ok(delta) => {
                            state.apply(&delta);
                            yield Ok(StepEvent::new(node, delta));
                        }
                        Err(e) => {
                            error!(run_id = %self.run_id, node = %node, error = %e, "Node failed, aborting run");
                            yield Err(e);
                            return;
                        }
                    }
                }

                if router::decide(&state, self.ctx.config.max_iterations) == Decision::Stop {
                    break;
                }

                if cycles > self.ctx.config.max_iterations {
                    warn!(
                        run_id = %self.run_id,
                        cycles,
                        "Loop guard: stopping run whose iteration count is not advancing"
                    );
                    break;
                }
            }

            info!(
                run_id = %self.run_id,
                iterations = state.iterations,
                status = ?state.status,
                scan = ?state.security_scan,
                "Workflow run complete"
            );
        }
    }

    /// Convenience driver: consumes the whole stream and returns the final
    /// cumulative state.
    pub async fn run_to_completion(
        &self,
        initial: WorkflowState,
    ) -> Result<WorkflowState, WorkflowError> {
        let mut view = initial.clone();
        let stream = self.run(initial);
        futures::pin_mut!(stream);

        while let Some(event) = stream.next().await {
            view.apply(&event?.delta);
        }

        Ok(view)
    }
}
