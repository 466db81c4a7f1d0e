//! Error taxonomy for the workflow engine.
//!
//! Only plan-level failures live here — they abort the whole workflow
//! before or between steps. Step-local failures (a classified tool
//! failure, an unusable correction) are ordinary values in the executor
//! state machine and never become `WorkflowError`s.

/// Fatal, workflow-aborting failures.
///
/// `Parse` and `Schema` carry the offending upstream text verbatim so a
/// session transcript is enough to diagnose a bad planner response.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The planner collaborator returned an empty response during planning.
    #[error("planner returned an empty response")]
    PlanningEmpty,

    /// No viable JSON plan candidate survived extraction.
    #[error("no JSON plan candidate found in planner response:\n{response}")]
    Extraction { response: String },

    /// The candidate plan string is not JSON, even after lenient repair.
    #[error("invalid JSON in plan: {message}\nInput:\n{input}")]
    Parse { message: String, input: String },

    /// The plan parsed but violates the task schema.
    #[error("invalid plan structure: {message}\nInput:\n{input}")]
    Schema { message: String, input: String },
}

/// A tool collaborator could not be invoked at all.
///
/// Faults are non-retryable: the step goes straight to Error without
/// entering the correction loop.
#[derive(Debug, thiserror::Error)]
pub enum ToolFault {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    /// The collaborator raised internally. `detail` holds whatever
    /// trace/context the collaborator could capture.
    #[error("tool '{tool}' raised: {message}")]
    Raised {
        tool: String,
        message: String,
        detail: String,
    },
}

impl ToolFault {
    /// Render the fault as a synthetic failing raw result, so the task
    /// record always holds *some* textual result for diagnosis.
    pub fn to_raw_result(&self) -> String {
        match self {
            Self::UnknownTool(name) => format!("Error: Unknown tool '{}'.", name),
            Self::Raised { tool, message, detail } => {
                if detail.is_empty() {
                    format!("Error: Tool '{}' exception: {}", tool, message)
                } else {
                    format!("Error: Tool '{}' exception: {}\n{}", tool, message, detail)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_errors_carry_the_offending_input() {
        let err = WorkflowError::Parse {
            message: "expected value at line 1".to_string(),
            input: "not json at all".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("not json at all"));
    }

    #[test]
    fn unknown_tool_renders_as_raw_result() {
        let fault = ToolFault::UnknownTool("quantum_leap".to_string());
        assert_eq!(fault.to_raw_result(), "Error: Unknown tool 'quantum_leap'.");
    }
}
