//! Workflow orchestration: planning → validation → budgeted sequential
//! execution → finalization.
//!
//! One orchestrator run serves one user request. Steps run strictly in
//! plan order — step n+1 never starts before step n reaches a terminal
//! per-step outcome, because later steps may consume the prior step's
//! output context. A single Error step aborts the remaining plan; the
//! step budget is a hard ceiling on *executed* steps.

use std::panic::AssertUnwindSafe;

use chrono::{DateTime, Utc};
use futures::FutureExt;

use crate::channel::{clear_task_list, TaskBoard, UpdateChannel};
use crate::config::SessionConfig;
use crate::error::WorkflowError;
use crate::executor::StepExecutor;
use crate::models::task::{build_tasks, Task, TaskStatus};
use crate::plan::{extract, validate};
use crate::planner::Planner;
use crate::prompts::{final_check_prompt, NO_PRIOR_OUTPUT, SYSTEM_PROMPT};
use crate::tools::ToolRegistry;

/// Terminal state of one workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowTerminal {
    Completed,
    Failed,
    /// Controlled stop: the step budget ran out with tasks left Pending.
    StepLimitReached,
}

/// Aggregated result of one workflow run.
#[derive(Debug)]
pub struct WorkflowReport {
    pub terminal: WorkflowTerminal,
    pub tasks: Vec<Task>,
    /// Final human-readable status line, as published on the channel.
    pub message: String,
    /// Planner-synthesized final answer, when the summarization hook ran.
    pub final_answer: Option<String>,
    pub executed_steps: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub struct WorkflowOrchestrator<'a> {
    planner: &'a dyn Planner,
    registry: &'a ToolRegistry,
    config: &'a SessionConfig,
}

impl<'a> WorkflowOrchestrator<'a> {
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

    /// Run one workflow for `user_query`.
    ///
    /// Plan-level failures (empty planner response, no JSON candidate,
    /// parse/schema violations) abort before any step executes: the
    /// displayed task list is cleared and the error — including the raw
    /// upstream text — is reported verbatim on the channel.
    pub async fn run(
        &self,
        user_query: &str,
        channel: &dyn UpdateChannel,
    ) -> Result<WorkflowReport, WorkflowError> {
        let started_at = Utc::now();
        match self.plan_and_execute(user_query, started_at, channel).await {
            Ok(report) => Ok(report),
            Err(err) => {
                tracing::error!(error = %err, "workflow aborted before execution");
                clear_task_list(channel).await;
                let _ = channel.send_text(&format!("Agent Error: {}", err)).await;
                Err(err)
            }
        }
    }

    async fn plan_and_execute(
        &self,
        user_query: &str,
        started_at: DateTime<Utc>,
        channel: &dyn UpdateChannel,
    ) -> Result<WorkflowReport, WorkflowError> {
        // 1) Plan.
        let _ = channel.send_text("Agent: Planning steps...").await;
        tracing::info!(model = %self.config.planner_model, "requesting plan");
        let raw_response = self
            .planner
            .prompt(&self.config.planner_model, user_query, SYSTEM_PROMPT)
            .await;
        if raw_response.is_empty() {
            return Err(WorkflowError::PlanningEmpty);
        }

        // 2) Extract and validate.
        let extracted = extract(&raw_response);
        tracing::debug!(tier = ?extracted.tier, "plan candidate extracted");
        if extracted.candidate.trim().is_empty() {
            return Err(WorkflowError::Extraction {
                response: raw_response,
            });
        }
        let planned = validate(&extracted.candidate)?;

        // 3) Publish the initial list.
        let mut board = TaskBoard::new(build_tasks(planned));
        board.publish(channel).await;
        if board.is_empty() {
            let message = "Agent: No steps planned.".to_string();
            let _ = channel.send_text(&message).await;
            return Ok(WorkflowReport {
                terminal: WorkflowTerminal::Completed,
                tasks: board.into_tasks(),
                message,
                final_answer: None,
                executed_steps: 0,
                started_at,
                finished_at: Utc::now(),
            });
        }
        let _ = channel
            .send_text(&format!("Agent: Plan: {} steps.", board.len()))
            .await;

        // 4) Execute sequentially under the step budget.
        let executor = StepExecutor::new(self.planner, self.registry, self.config);
        let mut prior_output = NO_PRIOR_OUTPUT.to_string();
        let mut executed: usize = 0;
        let mut failed_step: Option<usize> = None;
        let mut stopped_early = false;

        for index in 0..board.len() {
            if executed >= self.config.max_workflow_steps {
                let _ = channel
                    .send_text(&format!(
                        "**Warn: Max steps ({}) reached.**",
                        self.config.max_workflow_steps
                    ))
                    .await;
                tracing::warn!(
                    executed,
                    remaining = board.len() - index,
                    "step budget exhausted"
                );
                stopped_early = true;
                break;
            }

            board.set_status(index, TaskStatus::Running, channel).await;
            {
                let task = board.task(index);
                let _ = channel
                    .send_text(&format!(
                        "**Agent: Step {}/{}: {}**\n - Reasoning: {}\n - Expecting: {}",
                        index + 1,
                        board.len(),
                        task.description,
                        task.original.reasoning,
                        task.original.expected_output,
                    ))
                    .await;
            }

            // A panicking collaborator must not leave the displayed list
            // stuck on "running": contain it, mark everything unfinished
            // as Error, and report.
            let outcome = match AssertUnwindSafe(
                executor.run(index, &mut board, &prior_output, channel),
            )
            .catch_unwind()
            .await
            {
                Ok(outcome) => outcome,
                Err(panic) => {
                    let detail = panic_text(panic.as_ref());
                    tracing::error!(step = index + 1, detail = %detail, "unexpected fault during step");
                    board.mark_unfinished_error(channel).await;
                    let _ = channel
                        .send_text(&format!(
                            "Agent Error: Unexpected fault in step {}: {}",
                            index + 1,
                            detail
                        ))
                        .await;
                    executed += 1;
                    failed_step = Some(index);
                    break;
                }
            };
            executed += 1;

            let status = outcome.status;
            board
                .finish_step(index, status, outcome.final_task, outcome.raw_result, channel)
                .await;
            let _ = channel
                .send_text(&format!(
                    "**Agent: Step {} finished: {}**",
                    index + 1,
                    status.as_str().to_uppercase()
                ))
                .await;

            if status == TaskStatus::Error {
                failed_step = Some(index);
                break;
            }

            // Seed the next step with this step's output.
            prior_output = if outcome.parsed.output.is_empty() {
                outcome.parsed.raw.clone()
            } else {
                outcome.parsed.output.clone()
            };
            tokio::time::sleep(self.config.step_throttle).await;
        }

        // 5) Finalize.
        let (terminal, message) = match (failed_step, stopped_early) {
            (Some(index), _) => (
                WorkflowTerminal::Failed,
                format!("Agent Error: Failed step {}.", index + 1),
            ),
            (None, true) => (
                WorkflowTerminal::StepLimitReached,
                format!(
                    "Agent: Stopped after reaching the step limit ({}).",
                    self.config.max_workflow_steps
                ),
            ),
            (None, false) => (
                WorkflowTerminal::Completed,
                "Agent: Workflow finished.".to_string(),
            ),
        };

        let final_answer = if terminal == WorkflowTerminal::Completed && self.config.summarize {
            self.summarize(user_query, &prior_output, channel).await
        } else {
            None
        };

        let _ = channel.send_text(&format!("**{}**", message)).await;
        tracing::info!(?terminal, executed, "workflow finished");

        Ok(WorkflowReport {
            terminal,
            tasks: board.into_tasks(),
            message,
            final_answer,
            executed_steps: executed,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Optional summarization hook: ask the planner for a final
    /// user-facing answer from the last successful output.
    async fn summarize(
        &self,
        user_query: &str,
        last_output: &str,
        channel: &dyn UpdateChannel,
    ) -> Option<String> {
        let _ = channel
            .send_text("Agent: Performing final check & summarization...")
            .await;
        let answer = self
            .planner
            .prompt(
                &self.config.planner_model,
                &final_check_prompt(user_query, last_output),
                SYSTEM_PROMPT,
            )
            .await;
        if answer.is_empty() {
            tracing::warn!("summarization produced no answer");
            return None;
        }
        let _ = channel.send_text(&format!("Agent: {}", answer)).await;
        Some(answer)
    }
}

/// Best-effort text for a panic payload.
fn panic_text(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown fault".to_string()
    }
}
