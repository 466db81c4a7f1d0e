//! Per-session configuration.
//!
//! Process-wide defaults are plain constants; a `SessionConfig` snapshot
//! is taken when a session starts and then passed by reference through
//! the orchestrator. Nothing mutates it mid-workflow, so concurrent
//! sessions never observe each other's model selections.

use std::time::Duration;

/// Maximum correction retries per step. A step performs at most
/// `MAX_RETRIES + 1` tool invocations.
pub const MAX_RETRIES: u32 = 2;

/// Hard ceiling on *executed* steps per workflow run. Planned tasks past
/// the ceiling stay Pending and are never run.
pub const MAX_WORKFLOW_STEPS: usize = 10;

/// Step-count hint forwarded to long-running browser-style tools.
pub const BROWSER_STEP_LIMIT_SUGGESTION: u32 = 15;

/// Pause between successful steps. A throttle, not a correctness
/// requirement.
pub const STEP_THROTTLE: Duration = Duration::from_millis(200);

/// How the classifier treats free-text tool results.
///
/// Structured tool outcomes never pass through these heuristics; the
/// flags only govern inference from prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierPolicy {
    /// Scan the raw text for a fixed error-keyword set when no exit code
    /// marks the result as failed.
    pub keyword_heuristic: bool,
    /// Treat "exit code 0 but both sections empty" as a failure. Favors
    /// retry over silently passing an empty result downstream.
    pub empty_success_is_failure: bool,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self {
            keyword_heuristic: true,
            empty_success_is_failure: true,
        }
    }
}

/// Immutable configuration snapshot for one workflow session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Model used for planning and step correction.
    pub planner_model: String,
    pub max_retries: u32,
    pub max_workflow_steps: usize,
    pub browser_step_hint: u32,
    pub classifier: ClassifierPolicy,
    /// Ask the planner for a final user-facing answer after a fully
    /// successful run.
    pub summarize: bool,
    pub step_throttle: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            planner_model: "qwen2.5:7b".to_string(),
            max_retries: MAX_RETRIES,
            max_workflow_steps: MAX_WORKFLOW_STEPS,
            browser_step_hint: BROWSER_STEP_LIMIT_SUGGESTION,
            classifier: ClassifierPolicy::default(),
            summarize: false,
            step_throttle: STEP_THROTTLE,
        }
    }
}

impl SessionConfig {
    pub fn with_planner_model(model: impl Into<String>) -> Self {
        Self {
            planner_model: model.into(),
            ..Self::default()
        }
    }
}
