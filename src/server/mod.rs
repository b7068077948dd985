// HTTP server
// Serves the chat page and the streaming chat route

pub mod stream;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::RagError;
use crate::chat::{ChatError, ChatRequest, ChatService};
use crate::config::Config;

pub use stream::data_stream_response;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Shared, read-only state handed to every request
pub struct AppState {
    pub config: Config,
    pub chat: ChatService,
}

impl AppState {
    #[inline]
    pub fn new(config: Config, chat: ChatService) -> Self {
        Self { config, chat }
    }

    /// Ceiling on the whole chat request, streaming included
    #[inline]
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.config.server.max_duration_seconds)
    }
}

impl IntoResponse for ChatError {
    #[inline]
    fn into_response(self) -> Response {
        let status = match self {
            Self::InvalidQuestion => StatusCode::BAD_REQUEST,
            Self::EmbeddingUnavailable | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[inline]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until the process is stopped
#[inline]
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let bind_addr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    );
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    info!("Chat server listening on http://{}", addr);
    println!("Open http://{} to chat", addr);

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn chat(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response, ChatError> {
    let max_duration = state.max_duration();
    let deadline = Instant::now() + max_duration;

    let request = ChatRequest::parse(&body)?;
    debug!(
        "Chat request with {} messages, question of {} characters",
        request.messages.len(),
        request.question.chars().count()
    );

    let tokens = tokio::time::timeout_at(deadline, state.chat.answer(&request))
        .await
        .map_err(|_| {
            error!(
                "Chat request produced no response within {}s",
                max_duration.as_secs()
            );
            ChatError::Internal(RagError::Completion(format!(
                "no response within {}s",
                max_duration.as_secs()
            )))
        })??;

    Ok(data_stream_response(tokens, deadline))
}
