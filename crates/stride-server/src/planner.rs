//! Ollama-backed planner collaborator.
//!
//! Single-shot text completion against Ollama's `/api/generate` endpoint
//! with `stream: false`. Transport or decode failures are logged and
//! reported upward as an empty completion; the orchestrator treats that
//! as a planner failure and does not retry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use stride_core::planner::Planner;

pub struct OllamaPlanner {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaPlanner {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn generate(&self, model: &str, prompt: &str, system: &str) -> reqwest::Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body: GenerateResponse = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model,
                prompt,
                system,
                stream: false,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.response)
    }
}

#[async_trait]
impl Planner for OllamaPlanner {
    async fn prompt(&self, model: &str, text: &str, system: &str) -> String {
        match self.generate(model, text, system).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(model = %model, error = %err, "planner request failed");
                String::new()
            }
        }
    }
}
