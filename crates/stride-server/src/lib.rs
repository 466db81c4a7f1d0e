//! Stride Server — HTTP/WebSocket adapter for the workflow engine.
//!
//! Wires `stride-core`'s collaborator seams to real infrastructure:
//! - `/ws` — per-session WebSocket endpoint driving workflow runs
//! - Ollama-backed planner (`/api/generate`, non-streaming)
//! - a process-backed `shell_terminal` tool with a hard timeout
//! - `/api/models` — model listing proxied from Ollama
//! - optional static frontend serving

pub mod api;
pub mod planner;
pub mod state;
pub mod tools;
pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use stride_core::tools::ToolRegistry;

use self::planner::OllamaPlanner;
use self::state::{AppState, AppStateInner};
use self::tools::{ShellTool, SHELL_TOOL_NAME};

/// Configuration for the backend server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub ollama_base_url: String,
    /// Process-wide default planner model; overridable per session.
    pub planner_model: String,
    /// Hard wall-clock limit for one shell command.
    pub shell_timeout: Duration,
    /// Optional path to static frontend files. When set, the server
    /// serves these for all non-API routes.
    pub static_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            ollama_base_url: "http://localhost:11434".to_string(),
            // Track the core default so both ends agree out of the box.
            planner_model: stride_core::SessionConfig::default().planner_model,
            shell_timeout: Duration::from_secs(60),
            static_dir: None,
        }
    }
}

impl ServerConfig {
    /// Read configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("STRIDE_HOST").unwrap_or(defaults.host),
            port: std::env::var("STRIDE_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            ollama_base_url: std::env::var("OLLAMA_BASE_URL").unwrap_or(defaults.ollama_base_url),
            planner_model: std::env::var("PLANNER_MODEL").unwrap_or(defaults.planner_model),
            shell_timeout: std::env::var("SHELL_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.shell_timeout),
            static_dir: std::env::var("STATIC_DIR").ok(),
        }
    }
}

/// Build the shared `AppState` for a configuration.
pub fn build_state(config: &ServerConfig) -> AppState {
    let http = reqwest::Client::new();
    let planner = Arc::new(OllamaPlanner::new(
        http.clone(),
        config.ollama_base_url.clone(),
    ));

    let mut registry = ToolRegistry::new();
    registry.register(SHELL_TOOL_NAME, Arc::new(ShellTool::new(config.shell_timeout)));
    tracing::info!(tools = ?registry.names(), "tool registry initialized");

    Arc::new(AppStateInner {
        planner,
        registry: Arc::new(registry),
        http,
        ollama_base_url: config.ollama_base_url.clone(),
        default_planner_model: config.planner_model.clone(),
    })
}

/// Start the backend server.
///
/// Returns the actual address the server is listening on.
pub async fn start_server(config: ServerConfig) -> Result<SocketAddr, String> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stride_server=info,stride_core=info,tower_http=info".into()),
        )
        .init();

    tracing::info!(
        "Starting Stride backend server on {}:{}",
        config.host,
        config.port
    );

    let state = build_state(&config);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/api", api::router())
        .route("/api/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Serve static frontend files if configured
    if let Some(ref static_dir) = config.static_dir {
        let static_path = std::path::Path::new(static_dir);
        if static_path.exists() && static_path.is_dir() {
            tracing::info!("Serving static frontend from: {}", static_dir);
            let serve_dir = tower_http::services::ServeDir::new(static_dir)
                .not_found_service(tower_http::services::ServeFile::new(
                    static_path.join("index.html"),
                ));
            app = app.fallback_service(serve_dir);
        } else {
            tracing::warn!(
                "Static directory not found: {}. Frontend won't be served.",
                static_dir
            );
        }
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    tracing::info!("Stride backend server listening on {}", local_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "server": "stride-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
