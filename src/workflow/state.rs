//! Shared state threaded through the workflow nodes.
//!
//! One [`WorkflowState`] instance exists per run, owned by the engine. Nodes
//! never mutate it directly: each node returns a [`StateDelta`] that the
//! engine merges into its authoritative copy before the router or the next
//! node runs. The same deltas stream to the caller, who can reconstruct the
//! identical cumulative view by applying them in order.

use serde::{Deserialize, Serialize};

/// Outcome of a test execution, as recorded by the Tester node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No test run has completed yet.
    Pending,
    /// The last test run passed.
    Success,
    /// The last test run completed with failures.
    Failed,
    /// The last test run could not complete (timeout, missing runner).
    Error,
}

/// Structured classification of the last security scan.
///
/// The router branches on this enum, never on the human-readable report
/// text: the report is display-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    /// No scan has completed yet.
    Pending,
    /// Scanner ran and reported no findings.
    Clean,
    /// Scanner ran and reported findings.
    Findings,
    /// Scanner unavailable or scan infrastructure failed; not evidence of
    /// vulnerable code, so never blocks a stop decision.
    Skipped,
}

impl ScanOutcome {
    /// True when the scan does not stand in the way of stopping the loop.
    pub fn is_clean(&self) -> bool {
        matches!(self, ScanOutcome::Clean | ScanOutcome::Skipped)
    }
}

/// The mutable record threaded through every node of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    /// User-supplied task description; immutable after run start.
    pub objective: String,
    /// Latest generated source; overwritten by Developer.
    pub code_content: String,
    /// Generated test source; written once by Architect.
    pub test_content: String,
    /// Captured output of the last test execution; overwritten by Tester.
    pub test_output: String,
    /// Human-readable scan summary; overwritten by Security. Display only.
    pub security_report: String,
    /// Structured scan classification; overwritten by Security.
    pub security_scan: ScanOutcome,
    /// Test outcome; set only by Tester.
    pub status: RunStatus,
    /// Completed Developer executions; reset by Architect, incremented only
    /// by Developer.
    pub iterations: u32,
    /// Cumulative human-readable log; append-only.
    pub logs: Vec<String>,
}

impl WorkflowState {
    /// Constructs the initial state for a run.
    ///
    /// `existing_code` seeds `code_content` when the caller wants the loop to
    /// iterate on a pre-existing source file.
    pub fn new(objective: impl Into<String>, existing_code: Option<String>) -> Self {
        Self {
            objective: objective.into(),
            code_content: existing_code.unwrap_or_default(),
            test_content: String::new(),
            test_output: String::new(),
            security_report: String::new(),
            security_scan: ScanOutcome::Pending,
            status: RunStatus::Pending,
            iterations: 0,
            logs: Vec::new(),
        }
    }

    /// Merges a node's delta into this state.
    ///
    /// Scalar fields replace; `logs` appends. This is the single merge rule
    /// shared by the engine and any caller mirroring the stream.
    pub fn apply(&mut self, delta: &StateDelta) {
        if let Some(code) = &delta.code_content {
            self.code_content = code.clone();
        }
        if let Some(tests) = &delta.test_content {
            self.test_content = tests.clone();
        }
        if let Some(output) = &delta.test_output {
            self.test_output = output.clone();
        }
        if let Some(report) = &delta.security_report {
            self.security_report = report.clone();
        }
        if let Some(scan) = delta.security_scan {
            self.security_scan = scan;
        }
        if let Some(status) = delta.status {
            self.status = status;
        }
        if let Some(iterations) = delta.iterations {
            self.iterations = iterations;
        }
        self.logs.extend(delta.logs.iter().cloned());
    }
}

/// A node's partial state update.
///
/// Every field a node did not touch stays `None` (or empty for `logs`), so a
/// consumer can tell exactly what changed at each step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_report: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_scan: Option<ScanOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
    /// New log lines for this step only.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub logs: Vec<String>,
}

impl StateDelta {
    /// A delta carrying nothing but log lines (the degraded-node case).
    pub fn logs_only(lines: Vec<String>) -> Self {
        Self {
            logs: lines,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_defaults() {
        let state = WorkflowState::new("double a number", None);
        assert_eq!(state.status, RunStatus::Pending);
        assert_eq!(state.security_scan, ScanOutcome::Pending);
        assert_eq!(state.iterations, 0);
        assert!(state.test_output.is_empty());
        assert!(state.logs.is_empty());
    }

    #[test]
    fn test_existing_code_seeds_state() {
        let state = WorkflowState::new("obj", Some("x = 1".to_string()));
        assert_eq!(state.code_content, "x = 1");
    }

    #[test]
    fn test_apply_replaces_scalars_appends_logs() {
        let mut state = WorkflowState::new("obj", None);
        state.logs.push("first".to_string());

        let delta = StateDelta {
            code_content: Some("code v1".to_string()),
            status: Some(RunStatus::Failed),
            iterations: Some(1),
            logs: vec!["second".to_string(), "third".to_string()],
            ..StateDelta::default()
        };
        state.apply(&delta);

        assert_eq!(state.code_content, "code v1");
        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(state.iterations, 1);
        assert_eq!(state.logs, vec!["first", "second", "third"]);

        // A second delta replaces scalars again but never truncates logs.
        let delta2 = StateDelta {
            code_content: Some("code v2".to_string()),
            ..StateDelta::default()
        };
        state.apply(&delta2);
        assert_eq!(state.code_content, "code v2");
        assert_eq!(state.logs.len(), 3);
    }

    #[test]
    fn test_empty_delta_is_identity() {
        let mut state = WorkflowState::new("obj", Some("code".to_string()));
        state.logs.push("line".to_string());
        let before = state.clone();

        state.apply(&StateDelta::default());

        assert_eq!(state.code_content, before.code_content);
        assert_eq!(state.logs, before.logs);
        assert_eq!(state.iterations, before.iterations);
    }

    #[test]
    fn test_scan_outcome_clean_classification() {
        assert!(ScanOutcome::Clean.is_clean());
        assert!(ScanOutcome::Skipped.is_clean());
        assert!(!ScanOutcome::Findings.is_clean());
        assert!(!ScanOutcome::Pending.is_clean());
    }

    #[test]
    fn test_delta_serialization_omits_untouched_fields() {
        let delta = StateDelta {
            status: Some(RunStatus::Success),
            ..StateDelta::default()
        };
        let json = serde_json::to_string(&delta).unwrap();
        assert_eq!(json, r#"{"status":"success"}"#);
    }
}
