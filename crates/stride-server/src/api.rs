//! Model listing API.
//!
//! GET /api/models
//!
//! Proxies Ollama's `/api/tags` so the frontend can populate its model
//! picker. A failed upstream call degrades to an empty list rather than
//! an error page.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/models", get(list_models))
}

async fn list_models(State(state): State<AppState>) -> Json<Value> {
    let url = format!("{}/api/tags", state.ollama_base_url);
    match fetch_tags(&state.http, &url).await {
        Ok(names) => Json(json!({ "models": names })),
        Err(err) => {
            tracing::warn!(error = %err, "model listing failed");
            Json(json!({ "models": [] }))
        }
    }
}

async fn fetch_tags(client: &reqwest::Client, url: &str) -> reqwest::Result<Vec<String>> {
    let body: TagsResponse = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(body.models.into_iter().map(|m| m.name).collect())
}
