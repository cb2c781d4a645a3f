use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    serve, Json, Router,
};
use chrono::Local;
use futures::{sink::SinkExt, stream::StreamExt};
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use serde::Deserialize;
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::broadcast::error::RecvError;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::coach::{Coach, SessionSnapshot, SubmitRejected};
use crate::constants::EXPORT_FILENAME;

// Shared application state
#[derive(Clone)]
struct AppState {
    templates: Arc<AutoReloader>,
    coach: Arc<Coach>,
}

#[derive(Debug, Deserialize)]
struct SendRequest {
    content: String,
}

/// Where the web UI finds its templates and client assets.
#[derive(Debug, Clone)]
pub struct WebAssets {
    pub templates_dir: PathBuf,
    pub static_dir: PathBuf,
}

impl Default for WebAssets {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("templates"),
            static_dir: PathBuf::from("static"),
        }
    }
}

// Minijinja Environment setup
fn create_minijinja_env(templates_dir: &Path) -> AutoReloader {
    let templates_dir = templates_dir.to_path_buf();
    AutoReloader::new(move |notifier| {
        let mut env = Environment::new();
        env.set_loader(path_loader(templates_dir.clone()));
        notifier.watch_path(&templates_dir, true);
        Ok(env)
    })
}

impl IntoResponse for SubmitRejected {
    fn into_response(self) -> Response {
        let status = match self {
            SubmitRejected::EmptyInput => StatusCode::BAD_REQUEST,
            SubmitRejected::Busy => StatusCode::CONFLICT,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

async fn index_handler(State(state): State<AppState>) -> Result<Html<String>, Html<String>> {
    let snapshot = state.coach.snapshot().await;
    state
        .templates
        .acquire_env()
        .and_then(|env| {
            env.get_template("index.html").and_then(|tmpl| {
                tmpl.render(minijinja::context! {
                    title => "Mission & Vision Clarity Coach",
                    session => snapshot,
                })
            })
        })
        .map(Html)
        .map_err(|e| {
            error!("Failed to get or render template: {}", e);
            Html(format!("Internal Server Error: {}", e))
        })
}

async fn session_handler(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.coach.snapshot().await)
}

async fn send_handler(State(state): State<AppState>, Json(body): Json<SendRequest>) -> Response {
    // Run the round trip in its own task so a dropped client connection
    // cannot abandon the request with the busy flag still set.
    let coach = state.coach.clone();
    let task = tokio::spawn(async move { coach.submit(&body.content).await });

    match task.await {
        Ok(Ok(_)) => Json(state.coach.snapshot().await).into_response(),
        Ok(Err(rejected)) => rejected.into_response(),
        Err(e) => {
            error!("Submit task failed: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn reset_handler(State(state): State<AppState>) -> Json<SessionSnapshot> {
    state.coach.reset().await;
    Json(state.coach.snapshot().await)
}

async fn export_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.coach.export(Local::now().date_naive()).await;
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILENAME),
            ),
        ],
        body,
    )
}

// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket connection upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn snapshot_message(snapshot: &SessionSnapshot) -> Option<Message> {
    match serde_json::to_string(snapshot) {
        Ok(json_msg) => Some(Message::Text(json_msg)),
        Err(e) => {
            error!("Failed to serialize session snapshot: {}", e);
            None
        }
    }
}

// A lagged subscriber skips the missed snapshots and resyncs from the coach.
async fn resolve_change(
    change: Result<SessionSnapshot, RecvError>,
    coach: &Coach,
) -> Option<SessionSnapshot> {
    match change {
        Ok(snapshot) => Some(snapshot),
        Err(RecvError::Lagged(skipped)) => {
            warn!(skipped, "WebSocket client lagged; sending latest state");
            Some(coach.snapshot().await)
        }
        Err(RecvError::Closed) => None,
    }
}

// Pushes a snapshot to the client on every session change.
async fn handle_socket(socket: WebSocket, state: AppState) {
    info!("New WebSocket connection established");
    let (mut sender, mut receiver) = socket.split();
    let mut changes = state.coach.subscribe();

    if let Some(msg) = snapshot_message(&state.coach.snapshot().await) {
        if sender.send(msg).await.is_err() {
            warn!("Failed to send initial snapshot to new WebSocket client");
            return;
        }
    }

    loop {
        tokio::select! {
            change = changes.recv() => {
                let Some(snapshot) = resolve_change(change, &state.coach).await else {
                    break;
                };
                if let Some(msg) = snapshot_message(&snapshot) {
                    if sender.send(msg).await.is_err() {
                        warn!("WebSocket client disconnected or send error. Closing connection.");
                        break;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Text(text))) => {
                        warn!("Ignoring text message from WebSocket client: {}", text);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket receive error: {}", e);
                        break;
                    }
                }
            }
        }
    }
    info!("WebSocket connection closed");
}

/// Builds the application router around a shared coach.
pub fn build_router(coach: Arc<Coach>, assets: &WebAssets) -> Router {
    let state = AppState {
        templates: Arc::new(create_minijinja_env(&assets.templates_dir)),
        coach,
    };

    Router::new()
        .route("/", get(index_handler))
        .route("/api/session", get(session_handler))
        .route("/api/messages", post(send_handler))
        .route("/api/reset", post(reset_handler))
        .route("/export", get(export_handler))
        .route("/ws", get(ws_handler))
        .nest_service("/static", ServeDir::new(&assets.static_dir))
        .with_state(state)
        .layer(TraceLayer::new_for_http()) // Add request logging
}

pub async fn start_web_server(addr: SocketAddr, coach: Arc<Coach>, assets: WebAssets) -> Result<()> {
    let app = build_router(coach, &assets);

    info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{CompletionRequest, CompletionRequestFailure, CompletionService};
    use async_trait::async_trait;

    struct Unused;

    #[async_trait]
    impl CompletionService for Unused {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, CompletionRequestFailure> {
            Err(CompletionRequestFailure("not called".into()))
        }
    }

    #[tokio::test]
    async fn test_lagged_subscriber_resyncs_from_coach() {
        let coach = Coach::new(Arc::new(Unused));
        coach.reset().await;

        let snapshot = resolve_change(Err(RecvError::Lagged(7)), &coach).await.unwrap();
        assert_eq!(snapshot, coach.snapshot().await);
        assert!(snapshot.transcript[0].content.starts_with("Welcome back!"));
    }

    #[tokio::test]
    async fn test_closed_channel_ends_the_stream() {
        let coach = Coach::new(Arc::new(Unused));
        assert!(resolve_change(Err(RecvError::Closed), &coach).await.is_none());
    }

    #[tokio::test]
    async fn test_lagged_after_real_overflow() {
        let coach = Coach::new(Arc::new(Unused));
        let mut changes = coach.subscribe();
        // The channel holds 64 snapshots; overflow it.
        for _ in 0..70 {
            coach.reset().await;
        }
        let change = changes.recv().await;
        assert!(matches!(change, Err(RecvError::Lagged(_))));
        let snapshot = resolve_change(change, &coach).await.unwrap();
        assert_eq!(snapshot.transcript.len(), 1);
    }
}
