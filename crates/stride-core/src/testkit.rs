//! Scripted collaborators for tests and examples.
//!
//! These fakes replay canned responses in order, letting workflow
//! behavior be exercised without a model or real tools.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::channel::{ChannelClosed, UpdateChannel, TASK_LIST_TAG};
use crate::error::ToolFault;
use crate::planner::Planner;
use crate::tools::{InvokeContext, Tool, ToolOutcome};

/// Planner that replays canned responses in order, then empty strings.
pub struct ScriptedPlanner {
    responses: Mutex<VecDeque<String>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedPlanner {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Planner that always fails (empty responses).
    pub fn silent() -> Self {
        Self::new(Vec::<String>::new())
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn prompt(&self, _model: &str, text: &str, _system: &str) -> String {
        self.prompts.lock().unwrap().push(text.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default()
    }
}

/// Tool that replays canned outcomes in order and records every call.
pub struct ScriptedTool {
    outcomes: Mutex<VecDeque<Result<ToolOutcome, ToolFault>>>,
    pub invocations: AtomicUsize,
    pub seen_parameters: Mutex<Vec<Map<String, Value>>>,
    pub seen_prior_outputs: Mutex<Vec<String>>,
}

impl ScriptedTool {
    pub fn new<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = Result<ToolOutcome, ToolFault>>,
    {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            invocations: AtomicUsize::new(0),
            seen_parameters: Mutex::new(Vec::new()),
            seen_prior_outputs: Mutex::new(Vec::new()),
        }
    }

    /// Tool that always returns the same raw text.
    pub fn always(raw: &str) -> Self {
        Self::new(std::iter::repeat_with(|| Ok(ToolOutcome::Text(raw.to_string()))).take(64))
    }

    pub fn call_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for ScriptedTool {
    async fn invoke(
        &self,
        parameters: &Map<String, Value>,
        ctx: &InvokeContext<'_>,
        _channel: &dyn UpdateChannel,
    ) -> Result<ToolOutcome, ToolFault> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.seen_parameters.lock().unwrap().push(parameters.clone());
        self.seen_prior_outputs
            .lock()
            .unwrap()
            .push(ctx.prior_output.to_string());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ToolFault::Raised {
                    tool: "scripted".to_string(),
                    message: "script exhausted".to_string(),
                    detail: String::new(),
                })
            })
    }
}

/// Channel that records every line it is given.
#[derive(Default)]
pub struct RecordingChannel {
    pub lines: Mutex<Vec<String>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// Only the tagged task-list payloads, JSON part decoded.
    pub fn task_updates(&self) -> Vec<Value> {
        self.lines()
            .iter()
            .filter_map(|line| line.strip_prefix(TASK_LIST_TAG))
            .filter_map(|json| serde_json::from_str(json).ok())
            .collect()
    }
}

#[async_trait]
impl UpdateChannel for RecordingChannel {
    async fn send_text(&self, line: &str) -> Result<(), ChannelClosed> {
        self.lines.lock().unwrap().push(line.to_string());
        Ok(())
    }
}
