//! The code-generation loop: state machine, nodes, and loop controller.
//!
//! A run flows Architect → Developer → Security → Tester, then the router
//! either stops or re-enters Developer with accumulated feedback, bounded by
//! the iteration cap. See [`engine::WorkflowEngine`] for the entry point.

mod config;
mod engine;
mod nodes;
mod router;
mod state;

pub use config::{WorkflowConfig, DEFAULT_MAX_ITERATIONS};
pub use engine::{Node, StepEvent, WorkflowEngine};
pub use nodes::NodeContext;
pub use router::{decide, Decision};
pub use state::{RunStatus, ScanOutcome, StateDelta, WorkflowState};
