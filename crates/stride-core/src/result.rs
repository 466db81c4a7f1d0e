//! Tool result classification.
//!
//! Tools report results as semi-structured text ("Exit Code: N" plus
//! Output/Error sections). `ToolOutput::classify` parses that text into
//! structured fields and `failure_verdict` applies the ordered failure
//! rules. Classification is a pure function of the raw text and the
//! policy: identical input always yields the identical verdict.

use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::config::ClassifierPolicy;

/// Case-insensitive substrings that mark a textual result as failed when
/// the keyword heuristic is enabled.
pub const ERROR_KEYWORDS: [&str; 7] =
    ["error:", "fail", "except", "trace", "timeout", "denied", "not found"];

/// Why a result was judged a failure, in rule-priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// An `Exit Code:` line carried a non-zero value.
    NonZeroExit(i32),
    /// The raw text contained one of [`ERROR_KEYWORDS`].
    ErrorKeyword(&'static str),
    /// Exit code 0 with both sections empty. Suspicious rather than a
    /// proven failure; the policy favors retry over silent pass-through.
    EmptySuccess,
    /// A structured tool outcome reported `success: false` explicitly.
    ToolReported,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonZeroExit(code) => write!(f, "non-zero exit ({})", code),
            Self::ErrorKeyword(kw) => write!(f, "error keyword '{}'", kw),
            Self::EmptySuccess => write!(f, "empty success output"),
            Self::ToolReported => write!(f, "tool reported failure"),
        }
    }
}

/// A tool's raw result, split into structured fields. Derived on demand,
/// never stored independently of the raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub raw: String,
    pub exit_code: Option<i32>,
    pub output: String,
    pub error: String,
}

impl ToolOutput {
    /// Parse a raw textual result.
    ///
    /// Rules: the first `Exit Code: <int>` line sets the exit code;
    /// `Output:`/`Stdout Log:` and `Error:`/`Errors:`/`Stderr Log:`
    /// marker lines (case-insensitive) open the respective section; an
    /// exit-code line closes any open section; text before the first
    /// recognized marker is dropped from sectioning but kept in `raw`.
    /// When neither section yields content, the remainder (minus the
    /// exit-code line) becomes output on exit 0/absent, else error.
    pub fn classify(raw: &str) -> Self {
        let exit_re = Regex::new(r"(?m)^Exit Code:\s*(-?\d+)").unwrap();
        let out_marker = section_marker(r"^(Output|Stdout Log):");
        let err_marker = section_marker(r"^(Error|Errors|Stderr Log):");

        let exit_match = exit_re.find(raw);
        let exit_code = exit_re
            .captures(raw)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<i32>().ok());

        #[derive(PartialEq)]
        enum Section {
            None,
            Out,
            Err,
        }
        let mut section = Section::None;
        let mut out_lines: Vec<&str> = Vec::new();
        let mut err_lines: Vec<&str> = Vec::new();

        for line in raw.lines() {
            if out_marker.is_match(line) {
                section = Section::Out;
            } else if err_marker.is_match(line) {
                section = Section::Err;
            } else if line.starts_with("Exit Code:") {
                section = Section::None;
            } else {
                match section {
                    Section::Out => out_lines.push(line),
                    Section::Err => err_lines.push(line),
                    Section::None => {}
                }
            }
        }

        let mut output = out_lines.join("\n").trim().to_string();
        let mut error = err_lines.join("\n").trim().to_string();

        if output.is_empty() && error.is_empty() {
            let clean = match exit_match {
                Some(m) => raw.replacen(m.as_str(), "", 1),
                None => raw.to_string(),
            };
            let clean = clean.trim().to_string();
            match exit_code {
                Some(code) if code != 0 => error = clean,
                _ => output = clean,
            }
        }

        Self {
            raw: raw.to_string(),
            exit_code,
            output,
            error,
        }
    }

    /// Apply the failure rules in priority order. `None` means success.
    pub fn failure_verdict(&self, policy: &ClassifierPolicy) -> Option<FailureReason> {
        if let Some(code) = self.exit_code {
            if code != 0 {
                return Some(FailureReason::NonZeroExit(code));
            }
        }
        if policy.keyword_heuristic {
            let lower = self.raw.to_lowercase();
            for keyword in ERROR_KEYWORDS {
                if lower.contains(keyword) {
                    return Some(FailureReason::ErrorKeyword(keyword));
                }
            }
        }
        if policy.empty_success_is_failure
            && self.exit_code == Some(0)
            && self.output.is_empty()
            && self.error.is_empty()
        {
            return Some(FailureReason::EmptySuccess);
        }
        None
    }
}

fn section_marker(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .unwrap()
}
