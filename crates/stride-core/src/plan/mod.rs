//! Plan handling: isolate a JSON candidate from free-form planner text,
//! then parse/repair it into validated task records.

pub mod extract;
pub mod repair;
pub mod validate;

pub use extract::{extract, strip_code_fences, Extracted, ExtractionTier, PLAN_DELIMITER};
pub use repair::repair_json;
pub use validate::{parse_candidate, validate, ParseTier};
