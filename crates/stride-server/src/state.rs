//! Shared server state.

use std::sync::Arc;

use stride_core::tools::ToolRegistry;

use crate::planner::OllamaPlanner;

pub struct AppStateInner {
    pub planner: Arc<OllamaPlanner>,
    pub registry: Arc<ToolRegistry>,
    /// Shared HTTP client for non-planner Ollama calls (model listing).
    pub http: reqwest::Client,
    pub ollama_base_url: String,
    /// Process-wide default; each connection can override it per session.
    pub default_planner_model: String,
}

pub type AppState = Arc<AppStateInner>;
