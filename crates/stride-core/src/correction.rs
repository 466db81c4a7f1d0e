//! Bounded self-correction for failing steps.
//!
//! Given a failed attempt, ask the planner for exactly one corrected
//! task object. Any unusable reply — empty text, non-JSON, missing
//! `tool` — yields `None`, which ends correction for the step. The
//! engine never raises: correction unavailability is a normal outcome.

use serde_json::Value;

use crate::channel::UpdateChannel;
use crate::config::SessionConfig;
use crate::models::task::{PlannedTask, RESERVED_KEYS};
use crate::plan::{repair_json, strip_code_fences};
use crate::planner::Planner;
use crate::prompts::{correction_prompt, SYSTEM_PROMPT};

pub struct CorrectionEngine<'a> {
    planner: &'a dyn Planner,
    config: &'a SessionConfig,
}

impl<'a> CorrectionEngine<'a> {
    pub fn new(planner: &'a dyn Planner, config: &'a SessionConfig) -> Self {
        Self { planner, config }
    }

    /// Request one corrected task for a failed attempt. Callers only
    /// invoke this while `attempt < max_retries`.
    pub async fn try_correct(
        &self,
        task: &PlannedTask,
        failed_raw: &str,
        attempt: u32,
        reason: &str,
        channel: &dyn UpdateChannel,
    ) -> Option<PlannedTask> {
        let _ = channel
            .send_text(&format!(
                "Agent: Reviewing failure ({}; try {})...",
                reason,
                attempt + 1
            ))
            .await;

        let prompt = correction_prompt(task, attempt, self.config.max_retries, reason, failed_raw);
        let reply = self
            .planner
            .prompt(&self.config.planner_model, &prompt, SYSTEM_PROMPT)
            .await;

        if reply.is_empty() {
            tracing::warn!(attempt, "planner gave no correction");
            let _ = channel.send_text("Warn: planner gave no correction.").await;
            return None;
        }

        match self.parse_correction(task, &reply) {
            Some(corrected) => {
                tracing::info!(
                    attempt,
                    tool = %corrected.tool,
                    "received potential correction"
                );
                let _ = channel.send_text("Agent: Received potential correction.").await;
                Some(corrected)
            }
            None => {
                tracing::warn!(attempt, "correction reply unusable");
                let _ = channel
                    .send_text(&format!("Error parsing correction. Raw:\n{}", reply))
                    .await;
                None
            }
        }
    }

    /// Single-object mirror of the plan validation path: strip fences,
    /// repair, require a `tool` key, inherit missing fields from the
    /// original task.
    fn parse_correction(&self, original: &PlannedTask, reply: &str) -> Option<PlannedTask> {
        let clean = strip_code_fences(reply);
        let clean = clean.trim();
        if clean.is_empty() {
            return None;
        }

        let parsed: Value = serde_json::from_str(clean)
            .or_else(|_| serde_json::from_str(&repair_json(clean)))
            .ok()?;
        let obj = parsed.as_object()?;

        let tool = match obj.get("tool").and_then(Value::as_str) {
            Some(tool) if !tool.is_empty() => tool.to_string(),
            _ => return None,
        };

        let description = obj
            .get("description")
            .and_then(Value::as_str)
            .filter(|d| !d.is_empty())
            .unwrap_or(&original.description)
            .to_string();
        let expected_output = obj
            .get("expected_output")
            .and_then(Value::as_str)
            .unwrap_or(&original.expected_output)
            .to_string();
        let reasoning = obj
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or(&original.reasoning)
            .to_string();

        let parameters = obj
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Some(PlannedTask {
            tool,
            description,
            expected_output,
            reasoning,
            parameters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{RecordingChannel, ScriptedPlanner};
    use serde_json::Map;

    fn failing_task() -> PlannedTask {
        PlannedTask {
            tool: "shell_terminal".to_string(),
            description: "List the directory".to_string(),
            expected_output: "File names".to_string(),
            reasoning: "Need the names".to_string(),
            parameters: {
                let mut p = Map::new();
                p.insert("command".to_string(), serde_json::json!(["lls"]));
                p
            },
        }
    }

    fn config() -> SessionConfig {
        SessionConfig::default()
    }

    #[tokio::test]
    async fn fenced_correction_is_accepted_with_inherited_fields() {
        let planner = ScriptedPlanner::new([
            "```json\n{\"tool\": \"shell_terminal\", \"command\": [\"ls\"]}\n```",
        ]);
        let cfg = config();
        let engine = CorrectionEngine::new(&planner, &cfg);
        let channel = RecordingChannel::new();

        let corrected = engine
            .try_correct(&failing_task(), "Exit Code: 127", 0, "non-zero exit (127)", &channel)
            .await
            .expect("correction should parse");

        assert_eq!(corrected.tool, "shell_terminal");
        assert_eq!(corrected.parameters["command"], serde_json::json!(["ls"]));
        // Missing fields inherit from the failing task.
        assert_eq!(corrected.description, "List the directory");
        assert_eq!(corrected.expected_output, "File names");
        assert_eq!(corrected.reasoning, "Need the names");
    }

    #[tokio::test]
    async fn empty_reply_means_no_correction() {
        let planner = ScriptedPlanner::silent();
        let cfg = config();
        let engine = CorrectionEngine::new(&planner, &cfg);
        let channel = RecordingChannel::new();

        let corrected = engine
            .try_correct(&failing_task(), "Exit Code: 1", 0, "non-zero exit (1)", &channel)
            .await;
        assert!(corrected.is_none());
        assert!(channel
            .lines()
            .iter()
            .any(|l| l.contains("no correction")));
    }

    #[tokio::test]
    async fn non_json_reply_means_no_correction() {
        let planner = ScriptedPlanner::new(["I think the command was wrong, try ls instead."]);
        let cfg = config();
        let engine = CorrectionEngine::new(&planner, &cfg);
        let channel = RecordingChannel::new();

        let corrected = engine
            .try_correct(&failing_task(), "Exit Code: 1", 1, "non-zero exit (1)", &channel)
            .await;
        assert!(corrected.is_none());
    }

    #[tokio::test]
    async fn object_without_tool_means_no_correction() {
        let planner = ScriptedPlanner::new(["{\"description\": \"fixed\", \"command\": [\"ls\"]}"]);
        let cfg = config();
        let engine = CorrectionEngine::new(&planner, &cfg);
        let channel = RecordingChannel::new();

        let corrected = engine
            .try_correct(&failing_task(), "Exit Code: 1", 0, "non-zero exit (1)", &channel)
            .await;
        assert!(corrected.is_none());
    }

    #[tokio::test]
    async fn correction_request_embeds_failure_context() {
        let planner = ScriptedPlanner::new(["{\"tool\": \"shell_terminal\", \"command\": [\"ls\"]}"]);
        let cfg = config();
        let engine = CorrectionEngine::new(&planner, &cfg);
        let channel = RecordingChannel::new();

        engine
            .try_correct(&failing_task(), "Exit Code: 127\nError:\nlls: not found", 0, "non-zero exit (127)", &channel)
            .await;

        let prompts = planner.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("lls: not found"));
        assert!(prompts[0].contains("File names"));
        assert!(prompts[0].contains("non-zero exit (127)"));
    }
}
