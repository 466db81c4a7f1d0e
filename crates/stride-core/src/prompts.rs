//! Prompt contracts for the planner collaborator.
//!
//! The planning contract asks for a `<thinking_process>` block followed
//! by a bare JSON array of steps; the extractor keys off the closing tag
//! ([`crate::plan::PLAN_DELIMITER`]). The correction contract asks for a
//! single JSON object and nothing else.

use crate::models::task::PlannedTask;

/// Context string seeded into the first step of a workflow.
pub const NO_PRIOR_OUTPUT: &str = "No output from previous steps.";

/// System prompt guiding the planner for both planning and correction.
pub const SYSTEM_PROMPT: &str = r#"<role>
You are an autonomous task-execution agent. You achieve the user's request
by planning a sequence of tool calls, executing them, comparing results
against your stated expectations, and correcting failing steps. Final
presentation of results happens in a separate pass after the plan runs.
</role>

<capabilities>
Available tools:
1. `shell_terminal` — executes one shell command.
   Parameters: {"command": ["list", "of", "strings"]}
   Result format: "Exit Code: N", then "Output:" / "Error:" sections.
   The previous step's output is available to the agent between steps;
   plan each command so it can run on its own.
</capabilities>

<output_format_planning>
First write your reasoning inside <thinking_process> ... </thinking_process>
tags. After the closing tag, output ONLY a valid JSON list of steps.
Each step object MUST carry:
  - "tool": one of the tool names above
  - "description": concise objective of the step
  - "expected_output": what a successful result looks like
  - "reasoning": why the step is needed and how its output is used
  - the tool-specific parameters
No text before, inside, or after the JSON list other than the thinking
block. Ensure the JSON is valid; escape embedded code carefully.
</output_format_planning>

<output_format_correction>
When asked to fix a failed step, output ONLY the single corrected JSON
tool-call object ("tool", "description", "expected_output", "reasoning",
parameters). No explanations, no fences.
</output_format_correction>
"#;

/// Build the single-step correction request for a failed attempt.
///
/// Embeds the original call (minus expectation bookkeeping), its
/// expected outcome, the failure reason, and the raw tool output.
pub fn correction_prompt(
    task: &PlannedTask,
    attempt: u32,
    max_retries: u32,
    reason: &str,
    raw_output: &str,
) -> String {
    let call_json = serde_json::to_string_pretty(&task.call_json())
        .unwrap_or_else(|_| task.call_json().to_string());
    format!(
        "Failed step {}/{}:\nTask: {}\nExpected: {}\nCall:\n```json\n{}\n```\nReason: {}\nOutput:\n```\n{}\n```\n\nProvide ONLY the corrected JSON tool call (incl. 'tool', 'description', 'expected_output', 'reasoning', params).",
        attempt + 1,
        max_retries,
        task.description,
        task.expected_output,
        call_json,
        reason,
        raw_output,
    )
}

/// Build the optional final-summarization request after a fully
/// successful run.
pub fn final_check_prompt(user_query: &str, last_output: &str) -> String {
    format!(
        "Original Query: '{}'\nFinal result from the last successful step:\n```\n{}\n```\n\nWrite the final answer for the user based on this result. Answer directly and concisely; no JSON, no tool calls.",
        user_query, last_output,
    )
}
