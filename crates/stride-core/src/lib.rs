//! Stride Core — transport-agnostic workflow orchestration.
//!
//! Given a natural-language request, obtain a structured plan from a
//! language-model planner, execute each step through a tool collaborator,
//! detect failures, attempt bounded self-correction, and stream progress
//! over an update channel. This crate holds the whole engine: plan
//! extraction/validation, result classification, the per-step
//! retry/correction state machine, and the step-budgeted execution loop.
//!
//! It has **no HTTP framework dependency**: transports (the WebSocket
//! session endpoint, the Ollama planner client, real tools) live in
//! `stride-server`. Collaborators plug in through three seams:
//!
//! - [`planner::Planner`] — text completion for planning and correction
//! - [`tools::Tool`] / [`tools::ToolRegistry`] — external capabilities
//! - [`channel::UpdateChannel`] — per-session progress sink

pub mod channel;
pub mod config;
pub mod correction;
pub mod error;
pub mod executor;
pub mod models;
pub mod orchestrator;
pub mod plan;
pub mod planner;
pub mod prompts;
pub mod result;
pub mod testkit;
pub mod tools;

// Convenience re-exports
pub use config::SessionConfig;
pub use error::{ToolFault, WorkflowError};
pub use orchestrator::{WorkflowOrchestrator, WorkflowReport, WorkflowTerminal};
