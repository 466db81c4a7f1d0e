//! WebSocket session endpoint.
//!
//! One connection carries one session: the client sends a JSON request
//! per query, the server streams back progress lines and tagged
//! task-list payloads while the workflow runs. Model overrides are
//! sticky for the lifetime of the connection. Disconnecting mid-run
//! cancels the in-flight workflow.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use stride_core::channel::{ChannelClosed, UpdateChannel};
use stride_core::{SessionConfig, WorkflowOrchestrator};

use crate::state::AppState;

/// One client request. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct ClientRequest {
    #[serde(default)]
    query: String,
    planner_model: Option<String>,
}

/// Update channel writing into the per-connection send queue.
struct WsChannel {
    tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl UpdateChannel for WsChannel {
    async fn send_text(&self, line: &str) -> Result<(), ChannelClosed> {
        self.tx.send(line.to_string()).map_err(|_| ChannelClosed)
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_session(state, socket))
}

async fn handle_session(state: AppState, socket: WebSocket) {
    let session_id = Uuid::new_v4();
    tracing::info!(%session_id, "session opened");

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // Write task: serializes all outbound lines onto the socket.
    let writer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if sink.send(Message::Text(line.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Sticky per-connection model selection, seeded from the process
    // default. Replaced whenever a request carries an override.
    let mut planner_model = state.default_planner_model.clone();

    while let Some(Ok(message)) = stream.next().await {
        let text = match message {
            Message::Text(text) => text.to_string(),
            Message::Close(_) => break,
            _ => continue,
        };
        let request: ClientRequest = match serde_json::from_str(&text) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(%session_id, error = %err, "unparseable client message");
                let _ = tx.send("Agent Error: Invalid request payload.".to_string());
                continue;
            }
        };
        if let Some(model) = request.planner_model {
            planner_model = model;
        }
        let query = request.query.trim().to_string();
        if query.is_empty() {
            let _ = tx.send("Agent Error: Received empty query.".to_string());
            continue;
        }

        // Immutable snapshot for this run; later overrides only affect
        // later queries.
        let config = SessionConfig {
            summarize: true,
            ..SessionConfig::with_planner_model(planner_model.clone())
        };
        tracing::info!(%session_id, model = %config.planner_model, "query accepted");

        let planner = state.planner.clone();
        let registry = state.registry.clone();
        let channel = WsChannel { tx: tx.clone() };
        let mut workflow = tokio::spawn(async move {
            let orchestrator = WorkflowOrchestrator::new(&*planner, registry.as_ref(), &config);
            // Plan-level failures are already reported on the channel.
            let _ = orchestrator.run(&query, &channel).await;
        });

        // Drive the workflow while watching the socket: a disconnect
        // aborts the run, and dropping it kills any child processes.
        let disconnected = loop {
            tokio::select! {
                joined = &mut workflow => {
                    if let Err(err) = joined {
                        if err.is_panic() {
                            tracing::error!(%session_id, "workflow task panicked");
                            let _ = tx.send(
                                "Agent Error: An unexpected internal error occurred.".to_string(),
                            );
                        }
                    }
                    break false;
                }
                incoming = stream.next() => match incoming {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => {
                        workflow.abort();
                        break true;
                    }
                    // One query at a time; mid-run messages are dropped.
                    Some(Ok(_)) => {}
                }
            }
        };
        if disconnected {
            tracing::info!(%session_id, "client disconnected mid-workflow");
            break;
        }
    }

    drop(tx);
    let _ = writer.await;
    tracing::info!(%session_id, "session closed");
}
