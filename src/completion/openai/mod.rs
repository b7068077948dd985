
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};
use url::Url;

use super::{ChatMessage, ChatModel, CompletionEvent, FinishReason, TokenStream};
use crate::config::OpenAiConfig;
use crate::{RagError, Result};

/// Client for the OpenAI `/chat/completions` endpoint in streaming mode
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: reqwest::Client,
    url: Url,
    api_key: String,
    model: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl OpenAiChat {
    #[inline]
    pub fn new(config: &OpenAiConfig, api_key: &str) -> Result<Self> {
        // only the connect phase is bounded, a streamed answer may take longer
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Self::with_client(client, config, api_key)
    }

    #[inline]
    pub fn with_client(client: reqwest::Client, config: &OpenAiConfig, api_key: &str) -> Result<Self> {
        let url = config
            .api_url("chat/completions")
            .map_err(|e| RagError::Config(e.to_string()))?;

        Ok(Self {
            client,
            url,
            api_key: api_key.to_string(),
            model: config.chat_model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> Result<TokenStream> {
        debug!(
            "Requesting streamed completion from {} with {} messages",
            self.model,
            messages.len()
        );

        let request = CompletionRequest {
            model: &self.model,
            messages: &messages,
            max_tokens: self.max_tokens,
            stream: true,
        };

        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!("Completion request failed with HTTP {}: {}", status, message);
            return Err(RagError::Completion(format!(
                "Completion request failed ({status}): {message}"
            )));
        }

        Ok(sse_tokens(response.bytes_stream()))
    }
}

/// A decoded server-sent event relevant to a completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SseEvent {
    Token(String),
    Finished(FinishReason),
    Done,
    Failed(String),
}

/// Incremental decoder for a `text/event-stream` completion body.
///
/// Bytes are buffered until a full line is available, so events and UTF-8
/// sequences split across network chunks decode correctly.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            events.extend(parse_line(&String::from_utf8_lossy(&line)));
        }
        events
    }

    /// Decode whatever is left once the body has ended
    pub(crate) fn finish(&mut self) -> Vec<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&String::from_utf8_lossy(&rest))
    }
}

/// Events carried by one line; a chunk may hold both a delta and a finish reason
fn parse_line(line: &str) -> Vec<SseEvent> {
    let Some(data) = line.trim().strip_prefix("data:").map(str::trim_start) else {
        return Vec::new();
    };

    if data == "[DONE]" {
        return vec![SseEvent::Done];
    }

    let json: Value = match serde_json::from_str(data) {
        Ok(json) => json,
        Err(e) => {
            warn!("Malformed completion chunk: {}", e);
            return vec![SseEvent::Failed(format!("Malformed completion chunk: {e}"))];
        }
    };

    if let Some(error) = json.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return vec![SseEvent::Failed(message.to_string())];
    }

    let mut events = Vec::new();
    if let Some(content) = json
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|content| !content.is_empty())
    {
        events.push(SseEvent::Token(content.to_string()));
    }
    if let Some(reason) = json
        .pointer("/choices/0/finish_reason")
        .and_then(Value::as_str)
    {
        debug!("Completion finished with reason '{}'", reason);
        events.push(SseEvent::Finished(FinishReason::from_openai(reason)));
    }
    events
}

struct SseState<S> {
    body: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<CompletionEvent>>,
    finished: bool,
}

impl<S> SseState<S> {
    fn absorb(&mut self, events: Vec<SseEvent>) {
        for event in events {
            if self.finished {
                break;
            }
            match event {
                SseEvent::Token(token) => self.pending.push_back(Ok(CompletionEvent::Text(token))),
                SseEvent::Finished(reason) => {
                    self.pending.push_back(Ok(CompletionEvent::Finished(reason)));
                }
                SseEvent::Done => self.finished = true,
                SseEvent::Failed(message) => {
                    self.pending.push_back(Err(RagError::Completion(message)));
                    self.finished = true;
                }
            }
        }
    }
}

/// Turn a raw completion body into a stream of text deltas and finish reasons
pub(crate) fn sse_tokens<S, B, E>(body: S) -> TokenStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<RagError> + Send + 'static,
{
    let state = SseState {
        body: Box::pin(body),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let events = state.decoder.feed(bytes.as_ref());
                    state.absorb(events);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e.into()), state));
                }
                None => {
                    let events = state.decoder.finish();
                    state.absorb(events);
                    state.finished = true;
                }
            }
        }
    }))
}
