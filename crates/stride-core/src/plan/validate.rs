//! Plan validation: parse (or repair-and-parse) a candidate JSON string
//! into an ordered sequence of typed task records with required defaults
//! filled in.

use serde_json::{Map, Value};

use crate::error::WorkflowError;
use crate::models::task::{PlannedTask, DEFAULT_EXPECTED_OUTPUT, DEFAULT_REASONING, RESERVED_KEYS};
use crate::plan::repair::repair_json;

/// Parameter keys checked, in preference order, when synthesizing a
/// missing description.
const PRIMARY_PARAM_KEYS: [&str; 3] = ["command", "code", "input"];

/// Maximum characters of the primary parameter shown in a synthesized
/// description.
const PREVIEW_CHARS: usize = 50;

/// Which parse tier accepted the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseTier {
    Direct,
    Repaired,
}

/// Parse the candidate, falling back to the lenient repair pass when the
/// direct parse fails. The error carries the direct-parse message and
/// the full candidate text.
pub fn parse_candidate(candidate: &str) -> Result<(Value, ParseTier), WorkflowError> {
    if candidate.trim().is_empty() {
        return Err(WorkflowError::Parse {
            message: "received empty plan string".to_string(),
            input: candidate.to_string(),
        });
    }
    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => Ok((value, ParseTier::Direct)),
        Err(direct_err) => match serde_json::from_str::<Value>(&repair_json(candidate)) {
            Ok(value) => Ok((value, ParseTier::Repaired)),
            Err(_) => Err(WorkflowError::Parse {
                message: direct_err.to_string(),
                input: candidate.to_string(),
            }),
        },
    }
}

/// Validate a candidate JSON plan string into ordered task records.
///
/// A single object carrying a `tool` key is accepted as a one-step plan.
/// Each entry must be an object with a `tool`; missing `description` is
/// synthesized from the tool name and a truncated preview of its primary
/// parameter, and missing `expected_output`/`reasoning` get sentinel
/// defaults.
pub fn validate(candidate: &str) -> Result<Vec<PlannedTask>, WorkflowError> {
    let (parsed, _tier) = parse_candidate(candidate)?;

    let entries: Vec<Value> = match parsed {
        Value::Array(items) => items,
        Value::Object(obj) if obj.contains_key("tool") => vec![Value::Object(obj)],
        other => {
            return Err(WorkflowError::Schema {
                message: format!("plan must be a list, got {}", type_name(&other)),
                input: candidate.to_string(),
            })
        }
    };

    let mut tasks = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let obj = match entry {
            Value::Object(obj) => obj,
            other => {
                return Err(WorkflowError::Schema {
                    message: format!("item {} is not an object: {}", index, other),
                    input: candidate.to_string(),
                })
            }
        };

        let tool = match obj.get("tool").and_then(Value::as_str) {
            Some(tool) if !tool.is_empty() => tool.to_string(),
            _ => {
                return Err(WorkflowError::Schema {
                    message: format!(
                        "task {} missing 'tool': {}",
                        index,
                        Value::Object(obj.clone())
                    ),
                    input: candidate.to_string(),
                })
            }
        };

        let description = match obj.get("description").and_then(Value::as_str) {
            Some(desc) if !desc.is_empty() => desc.to_string(),
            _ => synthesize_description(&tool, &obj, index),
        };
        let expected_output = obj
            .get("expected_output")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_EXPECTED_OUTPUT)
            .to_string();
        let reasoning = obj
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_REASONING)
            .to_string();

        let parameters: Map<String, Value> = obj
            .into_iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .collect();

        tasks.push(PlannedTask {
            tool,
            description,
            expected_output,
            reasoning,
            parameters,
        });
    }

    Ok(tasks)
}

/// "Run <tool> (<param preview>...)", or a step-numbered fallback when
/// no primary parameter is present.
fn synthesize_description(tool: &str, obj: &Map<String, Value>, index: usize) -> String {
    let preview = PRIMARY_PARAM_KEYS
        .iter()
        .filter_map(|key| obj.get(*key))
        .map(preview_text)
        .find(|text| !text.is_empty());

    match preview {
        Some(text) => format!("Run {} ({}...)", tool, text),
        None => format!("Run {} step {}", tool, index + 1),
    }
}

fn preview_text(value: &Value) -> String {
    let rendered = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    rendered.chars().take(PREVIEW_CHARS).collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_parse_of_a_clean_plan() {
        let plan = r#"[
            {"tool": "browser", "description": "Find price", "expected_output": "A price", "reasoning": "Need it", "input": "search AAPL"},
            {"tool": "code_interpreter", "code": "print(1)"}
        ]"#;
        let tasks = validate(plan).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].tool, "browser");
        assert_eq!(tasks[0].description, "Find price");
        assert_eq!(tasks[0].parameters["input"], "search AAPL");
        // Second task had no description: synthesized from tool + code.
        assert!(tasks[1].description.contains("code_interpreter"));
        assert!(tasks[1].description.contains("print(1)"));
        assert_eq!(tasks[1].expected_output, DEFAULT_EXPECTED_OUTPUT);
        assert_eq!(tasks[1].reasoning, DEFAULT_REASONING);
    }

    #[test]
    fn repair_tier_rescues_near_json() {
        let plan = r#"[{'tool': 'shell_terminal', 'command': ['ls'],}]"#;
        let (_, tier) = parse_candidate(plan).unwrap();
        assert_eq!(tier, ParseTier::Repaired);
        let tasks = validate(plan).unwrap();
        assert_eq!(tasks[0].tool, "shell_terminal");
    }

    #[test]
    fn single_object_with_tool_becomes_singleton_plan() {
        let tasks = validate(r#"{"tool": "browser", "input": "go"}"#).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].tool, "browser");
    }

    #[test]
    fn non_list_plan_is_a_schema_error() {
        let err = validate(r#""just a string""#).unwrap_err();
        match err {
            WorkflowError::Schema { message, input } => {
                assert!(message.contains("must be a list"));
                assert_eq!(input, r#""just a string""#);
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn missing_tool_names_the_offending_index() {
        let plan = r#"[{"tool": "browser"}, {"description": "no tool here"}]"#;
        let err = validate(plan).unwrap_err();
        match err {
            WorkflowError::Schema { message, input } => {
                assert!(message.contains("task 1"));
                assert_eq!(input, plan);
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn unparseable_input_is_a_parse_error_with_input() {
        let err = validate("no json here").unwrap_err();
        match err {
            WorkflowError::Parse { input, .. } => assert_eq!(input, "no json here"),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn empty_plan_is_valid() {
        assert!(validate("[]").unwrap().is_empty());
    }

    #[test]
    fn command_preview_is_truncated() {
        let long = "x".repeat(200);
        let plan = format!(r#"[{{"tool": "code_interpreter", "code": "{}"}}]"#, long);
        let tasks = validate(&plan).unwrap();
        assert!(tasks[0].description.len() < 80);
        assert!(tasks[0].description.ends_with("...)"));
    }

    #[test]
    fn reserved_keys_never_leak_into_parameters() {
        let plan = r#"[{"tool": "browser", "status": "done", "input": "go"}]"#;
        let tasks = validate(plan).unwrap();
        assert!(!tasks[0].parameters.contains_key("status"));
        assert!(tasks[0].parameters.contains_key("input"));
    }
}
