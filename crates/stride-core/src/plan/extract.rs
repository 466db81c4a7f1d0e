//! Plan extraction from raw planner text.
//!
//! Planner output is unreliable prose: the contract asks for a
//! `<thinking_process>` block followed by a bare JSON array, but models
//! wrap plans in fences, prepend chatter, or skip the thinking block
//! entirely. Extraction therefore degrades through three tiers instead
//! of failing, and defers all validity checking to [`crate::plan::validate`].

use regex::Regex;

/// Closing delimiter separating the planner's reasoning from its plan.
pub const PLAN_DELIMITER: &str = "</thinking_process>";

/// Which fallback tier produced the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionTier {
    /// Text after the last delimiter, already bracket-shaped.
    DelimiterTail,
    /// Trailing `[...]` span found by regex over the whole response.
    TrailingBrackets,
    /// No usable delimiter structure; the (fence-stripped) whole
    /// response is the candidate.
    WholeResponse,
}

/// A candidate JSON plan string plus the tier that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub candidate: String,
    pub tier: ExtractionTier,
}

/// Isolate the candidate JSON plan substring. Never fails — some
/// candidate always comes back, possibly the raw response itself.
pub fn extract(raw: &str) -> Extracted {
    if let Some(idx) = raw.rfind(PLAN_DELIMITER) {
        let tail = raw[idx + PLAN_DELIMITER.len()..].trim();
        if tail.starts_with('[') && tail.ends_with(']') {
            return Extracted {
                candidate: tail.to_string(),
                tier: ExtractionTier::DelimiterTail,
            };
        }

        // Tail is not bracket-shaped; look for the last [...] span
        // anywhere in the response.
        let trailing = Regex::new(r"(?s)(\[.*?\])\s*$").unwrap();
        if let Some(caps) = trailing.captures(raw) {
            return Extracted {
                candidate: caps[1].trim().to_string(),
                tier: ExtractionTier::TrailingBrackets,
            };
        }

        return Extracted {
            candidate: raw.trim().to_string(),
            tier: ExtractionTier::WholeResponse,
        };
    }

    // No delimiter at all; the model may have answered with the plan
    // directly, possibly fenced.
    Extracted {
        candidate: strip_code_fences(raw).trim().to_string(),
        tier: ExtractionTier::WholeResponse,
    }
}

/// Remove leading/trailing markdown code-fence wrappers (```json ... ```).
pub fn strip_code_fences(text: &str) -> String {
    let open = Regex::new(r"(?m)^```(?:json)?[ \t]*\n?").unwrap();
    let close = Regex::new(r"(?m)\n?[ \t]*```[ \t]*$").unwrap();
    let stripped = open.replace_all(text, "");
    close.replace_all(&stripped, "").to_string()
}
