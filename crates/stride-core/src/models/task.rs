//! Task and plan data model.
//!
//! A `PlannedTask` is the wire-format unit the planner emits: a tool
//! name, three free-text fields, and whatever tool-specific parameters
//! remain. A `Task` is the orchestrator's per-step record built around
//! it. Task identity is the plan index; a plan's ordering is meaningful
//! (later steps may consume earlier output) and immutable once built.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys the orchestrator owns. Everything else on a planned task object
/// is an opaque tool parameter.
pub const RESERVED_KEYS: [&str; 5] = ["tool", "description", "expected_output", "reasoning", "status"];

/// Sentinel default when the planner omits `expected_output`.
pub const DEFAULT_EXPECTED_OUTPUT: &str = "No specific expectation defined.";
/// Sentinel default when the planner omits `reasoning`.
pub const DEFAULT_REASONING: &str = "No reasoning provided.";

/// One planned unit of work, as produced by the planner and consumed by
/// the executor. Parameters are opaque to the orchestrator beyond routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedTask {
    pub tool: String,
    pub description: String,
    pub expected_output: String,
    pub reasoning: String,
    #[serde(flatten)]
    pub parameters: Map<String, Value>,
}

impl PlannedTask {
    /// JSON object of the actual tool call — tool, description, and
    /// parameters, without the expectation/reasoning bookkeeping. Used
    /// when echoing a failed call back to the planner.
    pub fn call_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("tool".to_string(), Value::String(self.tool.clone()));
        obj.insert("description".to_string(), Value::String(self.description.clone()));
        for (key, value) in &self.parameters {
            obj.insert(key.clone(), value.clone());
        }
        Value::Object(obj)
    }
}

/// Per-step status. Transitions are monotonic: Pending → Running →
/// Done | Error, no back-edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Done,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    /// Done and Error are terminal for a step.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// The orchestrator's record for one plan entry.
#[derive(Debug, Clone)]
pub struct Task {
    /// Displayed step label. Starts as the validated description and may
    /// be updated when a correction changes it.
    pub description: String,
    pub status: TaskStatus,
    /// The task as first validated. Never mutated.
    pub original: PlannedTask,
    /// The variant (original or corrected) that produced the final
    /// recorded result. Set when the step reaches a terminal status.
    pub final_executed: Option<PlannedTask>,
    /// Last raw textual result, once at least one attempt completed.
    pub result: Option<String>,
}

impl Task {
    pub fn new(planned: PlannedTask) -> Self {
        Self {
            description: planned.description.clone(),
            status: TaskStatus::Pending,
            original: planned,
            final_executed: None,
            result: None,
        }
    }
}

/// Build the initial task records for a validated plan. An empty plan is
/// valid and yields an empty board.
pub fn build_tasks(planned: Vec<PlannedTask>) -> Vec<Task> {
    planned.into_iter().map(Task::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> PlannedTask {
        PlannedTask {
            tool: "shell_terminal".to_string(),
            description: "List files".to_string(),
            expected_output: DEFAULT_EXPECTED_OUTPUT.to_string(),
            reasoning: DEFAULT_REASONING.to_string(),
            parameters: {
                let mut p = Map::new();
                p.insert("command".to_string(), json!(["ls", "-la"]));
                p
            },
        }
    }

    #[test]
    fn flattened_parameters_round_trip() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["tool"], "shell_terminal");
        assert_eq!(value["command"], json!(["ls", "-la"]));

        let back: PlannedTask = serde_json::from_value(value).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn call_json_excludes_expectation_bookkeeping() {
        let call = sample().call_json();
        assert!(call.get("expected_output").is_none());
        assert!(call.get("reasoning").is_none());
        assert_eq!(call["command"], json!(["ls", "-la"]));
    }

    #[test]
    fn new_tasks_start_pending() {
        let tasks = build_tasks(vec![sample(), sample()]);
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.status == TaskStatus::Pending));
        assert!(tasks.iter().all(|t| t.result.is_none()));
    }

    #[test]
    fn status_wire_names_are_lowercase() {
        assert_eq!(serde_json::to_string(&TaskStatus::Running).unwrap(), "\"running\"");
        assert!(TaskStatus::Done.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }
}
