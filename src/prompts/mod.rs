//! LLM prompts for the code-generation loop.
//!
//! One builder per prompting node: the Architect designs the unit tests for
//! an objective, the Developer writes (or repairs) the candidate solution.
//! Builders return `(system, user)` message pairs; slot names are baked into
//! the prompts so the generated code imports and files line up with the
//! artifacts the tools run against.

use crate::artifacts::{CODE_SLOT, TEST_SLOT};

/// System prompt establishing the Architect role.
const ARCHITECT_SYSTEM_PROMPT: &str =
    "You are a software architect designing unit tests. Output ONLY code, no explanations.";

/// User prompt template for test design.
const ARCHITECT_USER_TEMPLATE: &str = "Write a pytest unit test for: '{objective}'. \
File: '{test_slot}'. Import 'solution'. ONLY code.";

/// System prompt establishing the Developer role.
const DEVELOPER_SYSTEM_PROMPT: &str =
    "You are a software developer. Output ONLY python code, no explanations.";

/// User prompt template for a fresh implementation (no feedback yet).
const DEVELOPER_USER_TEMPLATE: &str =
    "Write python code for: '{objective}'. File: '{code_slot}'. ONLY python code.";

/// User prompt template for a repair cycle with accumulated feedback.
const DEVELOPER_REPAIR_TEMPLATE: &str =
    "Fix code based on issues:\n{feedback}\nObjective: {objective}\nONLY python code.";

/// Builds the Architect prompt for the given objective.
pub fn architect_prompt(objective: &str) -> (String, String) {
    let user = ARCHITECT_USER_TEMPLATE
        .replace("{objective}", objective)
        .replace("{test_slot}", TEST_SLOT);
    (ARCHITECT_SYSTEM_PROMPT.to_string(), user)
}

/// Builds the Developer prompt.
///
/// When `feedback` is non-empty a repair prompt is produced; test failures
/// and security findings arrive pre-concatenated so the model sees both in a
/// single request.
pub fn developer_prompt(objective: &str, feedback: &str) -> (String, String) {
    let user = if feedback.is_empty() {
        DEVELOPER_USER_TEMPLATE
            .replace("{objective}", objective)
            .replace("{code_slot}", CODE_SLOT)
    } else {
        DEVELOPER_REPAIR_TEMPLATE
            .replace("{feedback}", feedback)
            .replace("{objective}", objective)
    };
    (DEVELOPER_SYSTEM_PROMPT.to_string(), user)
}

/// Builds the feedback block the Developer receives on a retry cycle.
///
/// Returns an empty string when there is no feedback yet (first cycle, or a
/// clean previous cycle that still loops for another reason).
pub fn feedback_context(test_output: &str, security_report: &str, findings: bool) -> String {
    let mut context = String::new();
    if !test_output.is_empty() {
        context.push_str("\nTEST FAILURES:\n");
        context.push_str(test_output);
    }
    if findings {
        context.push_str("\nSECURITY VULNERABILITIES:\n");
        context.push_str(security_report);
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architect_prompt_mentions_slot_and_module() {
        let (_, user) = architect_prompt("double a number");
        assert!(user.contains("double a number"));
        assert!(user.contains(TEST_SLOT));
        assert!(user.contains("Import 'solution'"));
    }

    #[test]
    fn test_developer_prompt_fresh() {
        let (_, user) = developer_prompt("double a number", "");
        assert!(user.contains(CODE_SLOT));
        assert!(!user.contains("Fix code"));
    }

    #[test]
    fn test_developer_prompt_repair() {
        let feedback = feedback_context("assert 4 == 5 failed", "", false);
        let (_, user) = developer_prompt("double a number", &feedback);
        assert!(user.starts_with("Fix code"));
        assert!(user.contains("TEST FAILURES"));
        assert!(user.contains("assert 4 == 5 failed"));
    }

    #[test]
    fn test_feedback_combines_both_sources_in_one_block() {
        let feedback = feedback_context("1 failed", "B602: shell injection", true);
        assert!(feedback.contains("TEST FAILURES"));
        assert!(feedback.contains("SECURITY VULNERABILITIES"));
        assert!(feedback.contains("B602"));
    }

    #[test]
    fn test_feedback_skips_clean_scan() {
        let feedback = feedback_context("1 failed", "No issues identified.", false);
        assert!(!feedback.contains("SECURITY"));
    }

    #[test]
    fn test_feedback_empty_when_nothing_to_report() {
        assert!(feedback_context("", "", false).is_empty());
    }
}
