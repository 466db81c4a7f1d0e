//! Process-backed shell tool.
//!
//! Runs a command under a hard wall-clock timeout and reports a
//! structured result, so success is judged by the real exit status
//! rather than inferred from output text.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::process::Command;

use stride_core::channel::UpdateChannel;
use stride_core::error::ToolFault;
use stride_core::tools::{InvokeContext, StructuredResult, Tool, ToolOutcome};

pub const SHELL_TOOL_NAME: &str = "shell_terminal";

pub struct ShellTool {
    timeout: Duration,
}

impl ShellTool {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Pull the command argv out of the planned parameters. Accepts either a
/// list of strings or a single string split with shell-style quoting.
fn command_argv(parameters: &Map<String, Value>) -> Result<Vec<String>, ToolFault> {
    let raised = |message: &str, detail: String| ToolFault::Raised {
        tool: SHELL_TOOL_NAME.to_string(),
        message: message.to_string(),
        detail,
    };
    let argv = match parameters.get("command") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| raised("'command' entries must be strings", item.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(Value::String(line)) => split_command_line(line)
            .ok_or_else(|| raised("unbalanced quoting in 'command'", line.clone()))?,
        Some(other) => {
            return Err(raised(
                "'command' must be a list of strings or a string",
                other.to_string(),
            ))
        }
        None => return Err(raised("missing 'command' parameter", String::new())),
    };
    if argv.is_empty() {
        return Err(raised("'command' is empty", String::new()));
    }
    Ok(argv)
}

/// Split a command line into argv with single/double quotes and
/// backslash escapes. `None` on an unterminated quote or a trailing
/// backslash.
fn split_command_line(line: &str) -> Option<Vec<String>> {
    let mut argv = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some('\'') => {
                if c == '\'' {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            Some(_) => match c {
                '"' => quote = None,
                '\\' => match chars.next()? {
                    n @ ('"' | '\\' | '$' | '`') => current.push(n),
                    n => {
                        current.push('\\');
                        current.push(n);
                    }
                },
                _ => current.push(c),
            },
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_token = true;
                }
                '\\' => {
                    current.push(chars.next()?);
                    in_token = true;
                }
                c if c.is_whitespace() => {
                    if in_token {
                        argv.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                _ => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }

    if quote.is_some() {
        return None;
    }
    if in_token {
        argv.push(current);
    }
    Some(argv)
}

#[async_trait]
impl Tool for ShellTool {
    async fn invoke(
        &self,
        parameters: &Map<String, Value>,
        _ctx: &InvokeContext<'_>,
        _channel: &dyn UpdateChannel,
    ) -> Result<ToolOutcome, ToolFault> {
        let argv = command_argv(parameters)?;
        tracing::info!(command = %argv.join(" "), "running shell command");

        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future (timeout, session cancellation)
            // must also kill the child; the runtime reaps it.
            .kill_on_drop(true);

        let child = command.spawn().map_err(|err| ToolFault::Raised {
            tool: SHELL_TOOL_NAME.to_string(),
            message: format!("failed to spawn '{}'", argv[0]),
            detail: err.to_string(),
        })?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let exit_code = output.status.code().unwrap_or(-1);
                Ok(ToolOutcome::Structured(StructuredResult {
                    success: output.status.success(),
                    exit_code: Some(exit_code),
                    output: String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
                    error: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
                }))
            }
            Ok(Err(err)) => Err(ToolFault::Raised {
                tool: SHELL_TOOL_NAME.to_string(),
                message: "failed to read process output".to_string(),
                detail: err.to_string(),
            }),
            Err(_) => {
                tracing::warn!(
                    command = %argv.join(" "),
                    timeout_secs = self.timeout.as_secs(),
                    "shell command timed out, killed"
                );
                // A classified failure, not a fault: the correction loop
                // may retry with a cheaper command.
                Ok(ToolOutcome::Structured(StructuredResult {
                    success: false,
                    exit_code: Some(-1),
                    output: String::new(),
                    error: format!(
                        "command timed out after {}s and was killed",
                        self.timeout.as_secs()
                    ),
                }))
            }
        }
    }
}
