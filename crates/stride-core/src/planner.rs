//! Planner collaborator seam.
//!
//! The same capability serves initial planning, step correction, and the
//! optional final summarization — a single text completion per call.

use async_trait::async_trait;

/// Language-model text-completion collaborator.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Complete `text` under `system` with the given model.
    ///
    /// An empty string signals failure. The orchestrator performs no
    /// transport-level retries: an empty result is immediately fatal for
    /// planning and ends correction for the current attempt.
    async fn prompt(&self, model: &str, text: &str, system: &str) -> String;
}
