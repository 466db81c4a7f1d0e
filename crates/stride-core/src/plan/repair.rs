//! Lenient JSON fixup for model output.
//!
//! A bounded, best-effort pass over near-JSON text: code fences, Python
//! literals, single-quoted strings, trailing commas, and unclosed
//! brackets. It deliberately does not try to be a full repair engine —
//! anything it cannot fix still fails the reparse and surfaces as a
//! plan parse error carrying the original text.

use crate::plan::extract::strip_code_fences;

/// Rewrite `input` into something `serde_json` is more likely to accept.
/// The output is not guaranteed to be valid JSON.
pub fn repair_json(input: &str) -> String {
    let text = strip_code_fences(input);
    let text = text.trim();

    let mut out = String::with_capacity(text.len() + 8);
    let mut stack: Vec<char> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(c);
                continue;
            }
            match c {
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            out.push(c);
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            // Single-quoted string: rewrite as double-quoted.
            '\'' => {
                out.push('"');
                let mut esc = false;
                for sc in chars.by_ref() {
                    if esc {
                        esc = false;
                        if sc == '\'' {
                            out.push('\'');
                        } else {
                            out.push('\\');
                            out.push(sc);
                        }
                        continue;
                    }
                    match sc {
                        '\\' => esc = true,
                        '\'' => break,
                        '"' => out.push_str("\\\""),
                        _ => out.push(sc),
                    }
                }
                out.push('"');
            }
            '{' => {
                stack.push('}');
                out.push(c);
            }
            '[' => {
                stack.push(']');
                out.push(c);
            }
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                }
                out.push(c);
            }
            // Trailing comma: drop it when the next token closes a
            // container.
            ',' => {
                let mut ws = String::new();
                while let Some(&w) = chars.peek() {
                    if w.is_whitespace() {
                        ws.push(w);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if !matches!(chars.peek(), Some('}') | Some(']') | None) {
                    out.push(',');
                }
                out.push_str(&ws);
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::new();
                word.push(c);
                while let Some(&w) = chars.peek() {
                    if w.is_ascii_alphanumeric() || w == '_' {
                        word.push(w);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match word.as_str() {
                    "True" => out.push_str("true"),
                    "False" => out.push_str("false"),
                    "None" => out.push_str("null"),
                    _ => out.push_str(&word),
                }
            }
            _ => out.push(c),
        }
    }

    if in_string {
        out.push('"');
    }
    while let Some(close) = stack.pop() {
        out.push(close);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn parses(input: &str) -> Value {
        serde_json::from_str(&repair_json(input)).expect("repaired text should parse")
    }

    #[test]
    fn valid_json_passes_through() {
        assert_eq!(parses(r#"[{"tool": "browser"}]"#), json!([{"tool": "browser"}]));
    }

    #[test]
    fn trailing_commas_are_dropped() {
        assert_eq!(
            parses(r#"[{"tool": "browser", }, ]"#),
            json!([{"tool": "browser"}])
        );
    }

    #[test]
    fn single_quotes_become_double_quotes() {
        assert_eq!(
            parses(r#"[{'tool': 'shell_terminal', 'command': ['ls']}]"#),
            json!([{"tool": "shell_terminal", "command": ["ls"]}])
        );
    }

    #[test]
    fn embedded_double_quotes_are_escaped() {
        assert_eq!(
            parses(r#"{'code': 'print("hi")'}"#),
            json!({"code": "print(\"hi\")"})
        );
    }

    #[test]
    fn python_literals_are_translated() {
        assert_eq!(
            parses(r#"{"done": True, "failed": False, "extra": None}"#),
            json!({"done": true, "failed": false, "extra": null})
        );
    }

    #[test]
    fn unclosed_brackets_are_balanced() {
        assert_eq!(
            parses(r#"[{"tool": "browser", "input": "go""#),
            json!([{"tool": "browser", "input": "go"}])
        );
    }

    #[test]
    fn fences_are_stripped_before_repair() {
        assert_eq!(
            parses("```json\n{\"tool\": \"browser\",}\n```"),
            json!({"tool": "browser"})
        );
    }

    #[test]
    fn literals_inside_strings_are_untouched() {
        assert_eq!(
            parses(r#"{"note": "None shall pass, True story"}"#),
            json!({"note": "None shall pass, True story"})
        );
    }
}
