//! Per-step execution with a bounded retry/correction loop.
//!
//! State machine per step: Attempting(0) → {Succeeded, Corrected(n),
//! Failed}. Only classified result failures are retryable; an unknown
//! tool name or a collaborator fault fails the step immediately. A step
//! performs at most `max_retries + 1` tool invocations.

use serde_json::Value;

use crate::channel::{TaskBoard, UpdateChannel};
use crate::config::SessionConfig;
use crate::correction::CorrectionEngine;
use crate::models::task::{PlannedTask, TaskStatus};
use crate::planner::Planner;
use crate::result::ToolOutput;
use crate::tools::{InvokeContext, ToolRegistry};

/// Terminal result of one step.
#[derive(Debug)]
pub struct StepOutcome {
    /// `Done` or `Error`.
    pub status: TaskStatus,
    /// The variant (original or corrected) behind the recorded result.
    pub final_task: PlannedTask,
    pub raw_result: String,
    /// Classification of the final raw result.
    pub parsed: ToolOutput,
    /// Tool invocations performed (1 ..= max_retries + 1).
    pub attempts: u32,
}

pub struct StepExecutor<'a> {
    planner: &'a dyn Planner,
    registry: &'a ToolRegistry,
    config: &'a SessionConfig,
}

impl<'a> StepExecutor<'a> {
    pub fn new(
        planner: &'a dyn Planner,
        registry: &'a ToolRegistry,
        config: &'a SessionConfig,
    ) -> Self {
        Self {
            planner,
            registry,
            config,
        }
    }

    /// Run the step at `index` on the board, threading in the previous
    /// step's output context. Updates the displayed step label when a
    /// correction changes the description; the caller records the final
    /// outcome on the board.
    pub async fn run(
        &self,
        index: usize,
        board: &mut TaskBoard,
        prior_output: &str,
        channel: &dyn UpdateChannel,
    ) -> StepOutcome {
        let mut current = board.task(index).original.clone();
        let ctx = InvokeContext {
            prior_output,
            browser_step_hint: self.config.browser_step_hint,
        };
        let mut attempt: u32 = 0;

        loop {
            let params_json =
                serde_json::to_string_pretty(&Value::Object(current.parameters.clone()))
                    .unwrap_or_else(|_| "{}".to_string());
            let _ = channel
                .send_text(&format!("Tool Input ({}): {}", current.tool, params_json))
                .await;
            tracing::info!(
                step = index + 1,
                attempt = attempt + 1,
                tool = %current.tool,
                "executing step"
            );

            let outcome = match self
                .registry
                .invoke(&current.tool, &current.parameters, &ctx, channel)
                .await
            {
                Ok(outcome) => outcome,
                Err(fault) => {
                    // Faults are fatal for the step: no classification,
                    // no correction.
                    tracing::warn!(step = index + 1, error = %fault, "tool fault");
                    let _ = channel.send_text(&format!("Error: {}", fault)).await;
                    let raw = fault.to_raw_result();
                    let parsed = ToolOutput::classify(&raw);
                    return StepOutcome {
                        status: TaskStatus::Error,
                        final_task: current,
                        raw_result: raw,
                        parsed,
                        attempts: attempt + 1,
                    };
                }
            };

            let (parsed, verdict) = outcome.evaluate(&self.config.classifier);
            let raw = parsed.raw.clone();
            let _ = channel
                .send_text(&format!("Tool Output (Try {}):\n```\n{}\n```", attempt + 1, raw))
                .await;

            let reason = match verdict {
                None => {
                    tracing::info!(step = index + 1, attempt = attempt + 1, "step succeeded");
                    return StepOutcome {
                        status: TaskStatus::Done,
                        final_task: current,
                        raw_result: raw,
                        parsed,
                        attempts: attempt + 1,
                    };
                }
                Some(reason) => reason,
            };

            tracing::warn!(
                step = index + 1,
                attempt = attempt + 1,
                reason = %reason,
                "step attempt failed"
            );

            if attempt >= self.config.max_retries {
                let _ = channel
                    .send_text(&format!(
                        "Agent: Step failed, max retries ({}) reached.",
                        self.config.max_retries
                    ))
                    .await;
                return StepOutcome {
                    status: TaskStatus::Error,
                    final_task: current,
                    raw_result: raw,
                    parsed,
                    attempts: attempt + 1,
                };
            }

            let _ = channel
                .send_text(&format!("Agent: Step {} error (try {}).", index + 1, attempt + 1))
                .await;
            let engine = CorrectionEngine::new(self.planner, self.config);
            match engine
                .try_correct(&current, &raw, attempt, &reason.to_string(), channel)
                .await
            {
                Some(corrected) => {
                    let _ = channel
                        .send_text(&format!("Agent: Applying correction (try {})...", attempt + 2))
                        .await;
                    if corrected.description != board.task(index).description {
                        board
                            .set_description(index, corrected.description.clone(), channel)
                            .await;
                    }
                    current = corrected;
                    attempt += 1;
                }
                None => {
                    return StepOutcome {
                        status: TaskStatus::Error,
                        final_task: current,
                        raw_result: raw,
                        parsed,
                        attempts: attempt + 1,
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolFault;
    use crate::models::task::build_tasks;
    use crate::testkit::{RecordingChannel, ScriptedPlanner, ScriptedTool};
    use crate::tools::ToolOutcome;
    use serde_json::Map;
    use std::sync::Arc;

    fn planned(tool: &str) -> PlannedTask {
        PlannedTask {
            tool: tool.to_string(),
            description: "step one".to_string(),
            expected_output: "something".to_string(),
            reasoning: "because".to_string(),
            parameters: Map::new(),
        }
    }

    fn board_for(task: PlannedTask) -> TaskBoard {
        TaskBoard::new(build_tasks(vec![task]))
    }

    fn registry_with(name: &str, tool: Arc<ScriptedTool>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(name, tool);
        registry
    }

    fn correction(desc: &str) -> String {
        format!(
            "{{\"tool\": \"shell_terminal\", \"description\": \"{}\", \"command\": [\"ls\"]}}",
            desc
        )
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let planner = ScriptedPlanner::silent();
        let tool = Arc::new(ScriptedTool::new([Ok(ToolOutcome::Text(
            "Exit Code: 0\nOutput:\nhello\n".to_string(),
        ))]));
        let registry = registry_with("shell_terminal", tool.clone());
        let cfg = SessionConfig::default();
        let executor = StepExecutor::new(&planner, &registry, &cfg);
        let mut board = board_for(planned("shell_terminal"));
        let channel = RecordingChannel::new();

        let outcome = executor.run(0, &mut board, "prior", &channel).await;
        assert_eq!(outcome.status, TaskStatus::Done);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.parsed.output, "hello");
        assert_eq!(tool.call_count(), 1);
        // Context was threaded into the invocation.
        assert_eq!(tool.seen_prior_outputs.lock().unwrap()[0], "prior");
    }

    #[tokio::test]
    async fn fails_twice_then_succeeds_with_corrected_task() {
        let planner = ScriptedPlanner::new([correction("try ls"), correction("try ls -la")]);
        let tool = Arc::new(ScriptedTool::new([
            Ok(ToolOutcome::Text("Exit Code: 127".to_string())),
            Ok(ToolOutcome::Text("Exit Code: 126".to_string())),
            Ok(ToolOutcome::Text("Exit Code: 0\nOutput:\ndone\n".to_string())),
        ]));
        let registry = registry_with("shell_terminal", tool.clone());
        let cfg = SessionConfig::default(); // max_retries = 2
        let executor = StepExecutor::new(&planner, &registry, &cfg);
        let mut board = board_for(planned("shell_terminal"));
        let channel = RecordingChannel::new();

        let outcome = executor.run(0, &mut board, "", &channel).await;
        assert_eq!(outcome.status, TaskStatus::Done);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(tool.call_count(), 3);
        // The final executed variant is the last correction.
        assert_eq!(outcome.final_task.description, "try ls -la");
        // The displayed label followed the corrections.
        assert_eq!(board.task(0).description, "try ls -la");
    }

    #[tokio::test]
    async fn never_more_than_max_retries_plus_one_invocations() {
        let planner = ScriptedPlanner::new([correction("a"), correction("b"), correction("c")]);
        let tool = Arc::new(ScriptedTool::always("Exit Code: 1"));
        let registry = registry_with("shell_terminal", tool.clone());
        let cfg = SessionConfig::default();
        let executor = StepExecutor::new(&planner, &registry, &cfg);
        let mut board = board_for(planned("shell_terminal"));
        let channel = RecordingChannel::new();

        let outcome = executor.run(0, &mut board, "", &channel).await;
        assert_eq!(outcome.status, TaskStatus::Error);
        assert_eq!(outcome.attempts, cfg.max_retries + 1);
        assert_eq!(tool.call_count(), (cfg.max_retries + 1) as usize);
        // The third correction request never happened.
        assert_eq!(planner.prompts.lock().unwrap().len(), cfg.max_retries as usize);
    }

    #[tokio::test]
    async fn unknown_tool_fails_without_retry() {
        let planner = ScriptedPlanner::new([correction("never used")]);
        let registry = ToolRegistry::new();
        let cfg = SessionConfig::default();
        let executor = StepExecutor::new(&planner, &registry, &cfg);
        let mut board = board_for(planned("warp_drive"));
        let channel = RecordingChannel::new();

        let outcome = executor.run(0, &mut board, "", &channel).await;
        assert_eq!(outcome.status, TaskStatus::Error);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.raw_result.contains("Unknown tool 'warp_drive'"));
        assert!(planner.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn tool_fault_fails_without_retry() {
        let planner = ScriptedPlanner::new([correction("never used")]);
        let tool = Arc::new(ScriptedTool::new([Err(ToolFault::Raised {
            tool: "shell_terminal".to_string(),
            message: "spawn failed".to_string(),
            detail: "os error 2".to_string(),
        })]));
        let registry = registry_with("shell_terminal", tool.clone());
        let cfg = SessionConfig::default();
        let executor = StepExecutor::new(&planner, &registry, &cfg);
        let mut board = board_for(planned("shell_terminal"));
        let channel = RecordingChannel::new();

        let outcome = executor.run(0, &mut board, "", &channel).await;
        assert_eq!(outcome.status, TaskStatus::Error);
        assert_eq!(tool.call_count(), 1);
        assert!(outcome.raw_result.contains("spawn failed"));
        assert!(planner.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_correction_ends_the_step() {
        let planner = ScriptedPlanner::silent();
        let tool = Arc::new(ScriptedTool::always("Exit Code: 1"));
        let registry = registry_with("shell_terminal", tool.clone());
        let cfg = SessionConfig::default();
        let executor = StepExecutor::new(&planner, &registry, &cfg);
        let mut board = board_for(planned("shell_terminal"));
        let channel = RecordingChannel::new();

        let outcome = executor.run(0, &mut board, "", &channel).await;
        assert_eq!(outcome.status, TaskStatus::Error);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(tool.call_count(), 1);
    }
}
