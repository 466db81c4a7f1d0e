//! The update channel and the published task board.
//!
//! One duplex, text-message channel exists per session. The orchestrator
//! pushes two kinds of messages: plain informational lines, and a tagged
//! `TASK_LIST_UPDATE:<json>` payload carrying the full task list in plan
//! order after every status (or label) transition. Sends are best-effort:
//! a closed channel never fails the workflow — cancellation is the
//! transport's job.

use async_trait::async_trait;
use serde::Serialize;

use crate::models::task::{Task, TaskStatus};

/// Tag prefixing the structured task-list payload on the wire.
pub const TASK_LIST_TAG: &str = "TASK_LIST_UPDATE:";

/// The receiving side went away.
#[derive(Debug, thiserror::Error)]
#[error("update channel closed")]
pub struct ChannelClosed;

/// Session-scoped sink for progress updates.
#[async_trait]
pub trait UpdateChannel: Send + Sync {
    async fn send_text(&self, line: &str) -> Result<(), ChannelClosed>;
}

/// Channel that discards everything. Useful for headless runs and tests.
pub struct NullChannel;

#[async_trait]
impl UpdateChannel for NullChannel {
    async fn send_text(&self, _line: &str) -> Result<(), ChannelClosed> {
        Ok(())
    }
}

/// Wire form of one task row.
#[derive(Debug, Serialize)]
pub struct TaskSnapshot<'a> {
    pub description: &'a str,
    pub status: TaskStatus,
}

/// Render the tagged task-list payload for the current board state.
pub fn task_list_payload(tasks: &[Task]) -> String {
    let rows: Vec<TaskSnapshot<'_>> = tasks
        .iter()
        .map(|t| TaskSnapshot {
            description: &t.description,
            status: t.status,
        })
        .collect();
    let json = serde_json::to_string(&rows).unwrap_or_else(|_| "[]".to_string());
    format!("{}{}", TASK_LIST_TAG, json)
}

/// The displayed task list for one workflow run. Owns the task records
/// and republishes the full list after every transition.
pub struct TaskBoard {
    tasks: Vec<Task>,
}

impl TaskBoard {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, index: usize) -> &Task {
        &self.tasks[index]
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }

    /// Push the current list over the channel. Best-effort.
    pub async fn publish(&self, channel: &dyn UpdateChannel) {
        let _ = channel.send_text(&task_list_payload(&self.tasks)).await;
    }

    /// Transition one task's status and republish. Terminal statuses are
    /// sticky; back-edges are ignored.
    pub async fn set_status(&mut self, index: usize, status: TaskStatus, channel: &dyn UpdateChannel) {
        if self.tasks[index].status.is_terminal() {
            return;
        }
        self.tasks[index].status = status;
        self.publish(channel).await;
    }

    /// Update the displayed step label (a correction changed the
    /// description) and republish.
    pub async fn set_description(&mut self, index: usize, description: String, channel: &dyn UpdateChannel) {
        if self.tasks[index].description == description {
            return;
        }
        self.tasks[index].description = description;
        self.publish(channel).await;
    }

    /// Record a step's terminal outcome in one transition.
    pub async fn finish_step(
        &mut self,
        index: usize,
        status: TaskStatus,
        final_executed: crate::models::task::PlannedTask,
        raw_result: String,
        channel: &dyn UpdateChannel,
    ) {
        {
            let task = &mut self.tasks[index];
            task.final_executed = Some(final_executed);
            task.result = Some(raw_result);
        }
        self.set_status(index, status, channel).await;
    }

    /// Mark every non-terminal task as Error and republish once. Used by
    /// the top-level unexpected-fault handler.
    pub async fn mark_unfinished_error(&mut self, channel: &dyn UpdateChannel) {
        let mut changed = false;
        for task in &mut self.tasks {
            if !task.status.is_terminal() {
                task.status = TaskStatus::Error;
                changed = true;
            }
        }
        if changed {
            self.publish(channel).await;
        }
    }
}

/// Clear the displayed task list (plan-level failure before any step ran).
pub async fn clear_task_list(channel: &dyn UpdateChannel) {
    let _ = channel.send_text(&task_list_payload(&[])).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::{build_tasks, PlannedTask};
    use crate::testkit::RecordingChannel;
    use serde_json::Map;

    fn planned(desc: &str) -> PlannedTask {
        PlannedTask {
            tool: "shell_terminal".to_string(),
            description: desc.to_string(),
            expected_output: "out".to_string(),
            reasoning: "why".to_string(),
            parameters: Map::new(),
        }
    }

    #[tokio::test]
    async fn payload_is_tagged_and_in_plan_order() {
        let board = TaskBoard::new(build_tasks(vec![planned("first"), planned("second")]));
        let payload = task_list_payload(board.tasks());
        assert!(payload.starts_with(TASK_LIST_TAG));
        let json: serde_json::Value =
            serde_json::from_str(payload.strip_prefix(TASK_LIST_TAG).unwrap()).unwrap();
        assert_eq!(json[0]["description"], "first");
        assert_eq!(json[0]["status"], "pending");
        assert_eq!(json[1]["description"], "second");
    }

    #[tokio::test]
    async fn transitions_republish_and_terminal_is_sticky() {
        let channel = RecordingChannel::new();
        let mut board = TaskBoard::new(build_tasks(vec![planned("step")]));
        board.set_status(0, TaskStatus::Running, &channel).await;
        board.set_status(0, TaskStatus::Done, &channel).await;
        board.set_status(0, TaskStatus::Running, &channel).await; // ignored
        assert_eq!(board.task(0).status, TaskStatus::Done);
        assert_eq!(channel.lines.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn mark_unfinished_error_spares_terminal_tasks() {
        let channel = RecordingChannel::new();
        let mut board = TaskBoard::new(build_tasks(vec![planned("a"), planned("b")]));
        board.set_status(0, TaskStatus::Done, &channel).await;
        board.mark_unfinished_error(&channel).await;
        assert_eq!(board.task(0).status, TaskStatus::Done);
        assert_eq!(board.task(1).status, TaskStatus::Error);
    }
}
