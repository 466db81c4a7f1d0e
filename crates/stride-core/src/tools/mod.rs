//! Tool collaborator seam and registry.
//!
//! Tools are external capabilities invoked with opaque, tool-specific
//! parameters. The orchestrator never inspects parameter contents beyond
//! routing the call by tool name. A tool either completes with a
//! [`ToolOutcome`] or raises a [`ToolFault`]; faults are never retried.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::channel::UpdateChannel;
use crate::config::ClassifierPolicy;
use crate::error::ToolFault;
use crate::result::{FailureReason, ToolOutput};

/// Per-invocation context threaded in from the execution loop.
///
/// `prior_output` is the last successful step's output (or a fixed
/// sentinel before the first step); how a tool uses it is tool-specific.
#[derive(Debug, Clone, Copy)]
pub struct InvokeContext<'a> {
    pub prior_output: &'a str,
    /// Step-count hint for long-running browser-style tools.
    pub browser_step_hint: u32,
}

/// Explicit result contract for collaborators that can report success
/// directly, bypassing text inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub output: String,
    pub error: String,
}

impl StructuredResult {
    /// Canonical textual rendering, matching the classifier's section
    /// grammar so the raw result stays readable in transcripts and
    /// correction prompts.
    pub fn render_raw(&self) -> String {
        let mut raw = String::new();
        if let Some(code) = self.exit_code {
            raw.push_str(&format!("Exit Code: {}\n", code));
        }
        if !self.output.is_empty() {
            raw.push_str("Output:\n");
            raw.push_str(&self.output);
            raw.push('\n');
        }
        if !self.error.is_empty() {
            raw.push_str("Error:\n");
            raw.push_str(&self.error);
            raw.push('\n');
        }
        raw
    }
}

/// What a tool invocation produced.
///
/// `Structured` is the preferred contract; `Text` is the legacy form for
/// collaborators that can only hand back prose, which then goes through
/// the heuristic classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Text(String),
    Structured(StructuredResult),
}

impl ToolOutcome {
    /// The raw textual result recorded on the task.
    pub fn raw(&self) -> String {
        match self {
            Self::Text(raw) => raw.clone(),
            Self::Structured(s) => s.render_raw(),
        }
    }

    /// Classify the outcome. Structured results are taken at their word:
    /// the policy's text heuristics apply only to `Text`.
    pub fn evaluate(&self, policy: &ClassifierPolicy) -> (ToolOutput, Option<FailureReason>) {
        match self {
            Self::Text(raw) => {
                let parsed = ToolOutput::classify(raw);
                let verdict = parsed.failure_verdict(policy);
                (parsed, verdict)
            }
            Self::Structured(s) => {
                let parsed = ToolOutput {
                    raw: s.render_raw(),
                    exit_code: s.exit_code,
                    output: s.output.clone(),
                    error: s.error.clone(),
                };
                let verdict = if s.success {
                    None
                } else {
                    match s.exit_code {
                        Some(code) if code != 0 => Some(FailureReason::NonZeroExit(code)),
                        _ => Some(FailureReason::ToolReported),
                    }
                };
                (parsed, verdict)
            }
        }
    }
}

/// One external capability.
#[async_trait]
pub trait Tool: Send + Sync {
    async fn invoke(
        &self,
        parameters: &Map<String, Value>,
        ctx: &InvokeContext<'_>,
        channel: &dyn UpdateChannel,
    ) -> Result<ToolOutcome, ToolFault>;
}

/// Fixed set of named tools for one deployment.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, tool: Arc<dyn Tool>) {
        self.tools.insert(name.into(), tool);
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Route an invocation by tool name. An unregistered name is a
    /// fatal, non-retryable [`ToolFault::UnknownTool`].
    pub async fn invoke(
        &self,
        name: &str,
        parameters: &Map<String, Value>,
        ctx: &InvokeContext<'_>,
        channel: &dyn UpdateChannel,
    ) -> Result<ToolOutcome, ToolFault> {
        let tool = self
            .tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolFault::UnknownTool(name.to_string()))?;
        tool.invoke(parameters, ctx, channel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_render_matches_classifier_grammar() {
        let result = StructuredResult {
            success: false,
            exit_code: Some(2),
            output: String::new(),
            error: "no such file".to_string(),
        };
        let parsed = ToolOutput::classify(&result.render_raw());
        assert_eq!(parsed.exit_code, Some(2));
        assert_eq!(parsed.error, "no such file");
    }

    #[test]
    fn structured_success_bypasses_keyword_heuristic() {
        // A structured success whose output *mentions* an error keyword
        // must not be misclassified.
        let outcome = ToolOutcome::Structured(StructuredResult {
            success: true,
            exit_code: Some(0),
            output: "grep found 3 lines containing 'error:'".to_string(),
            error: String::new(),
        });
        let (_, verdict) = outcome.evaluate(&ClassifierPolicy::default());
        assert_eq!(verdict, None);

        // The same text as a legacy outcome trips the heuristic.
        let text = ToolOutcome::Text("grep found 3 lines containing 'error:'".to_string());
        let (_, verdict) = text.evaluate(&ClassifierPolicy::default());
        assert!(verdict.is_some());
    }

    #[test]
    fn structured_failure_prefers_exit_code_reason() {
        let outcome = ToolOutcome::Structured(StructuredResult {
            success: false,
            exit_code: Some(127),
            output: String::new(),
            error: "command not found".to_string(),
        });
        let (_, verdict) = outcome.evaluate(&ClassifierPolicy::default());
        assert_eq!(verdict, Some(FailureReason::NonZeroExit(127)));

        let outcome = ToolOutcome::Structured(StructuredResult {
            success: false,
            exit_code: None,
            output: String::new(),
            error: "gave up".to_string(),
        });
        let (_, verdict) = outcome.evaluate(&ClassifierPolicy::default());
        assert_eq!(verdict, Some(FailureReason::ToolReported));
    }

    #[test]
    fn names_reflect_registrations() {
        use crate::testkit::ScriptedTool;
        let empty = || {
            Arc::new(ScriptedTool::new(
                Vec::<Result<ToolOutcome, ToolFault>>::new(),
            ))
        };
        let mut registry = ToolRegistry::new();
        registry.register("shell_terminal", empty());
        registry.register("browser", empty());
        let mut names = registry.names();
        names.sort_unstable();
        assert_eq!(names, vec!["browser", "shell_terminal"]);
    }

    #[tokio::test]
    async fn unknown_tool_is_a_fault() {
        let registry = ToolRegistry::new();
        let ctx = InvokeContext {
            prior_output: "",
            browser_step_hint: 15,
        };
        let err = registry
            .invoke("no_such_tool", &Map::new(), &ctx, &crate::channel::NullChannel)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolFault::UnknownTool(name) if name == "no_such_tool"));
    }
}
