// Streamed chat responses in the data stream protocol:
// one `<type>:<json>\n` part per line, text deltas as type 0,
// errors as type 3 and a closing finish part as type d.

use std::convert::Infallible;

use axum::body::Body;
use axum::http::header::{self, HeaderName};
use axum::response::{IntoResponse, Response};
use futures::stream::{self, Stream, StreamExt};
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::completion::{CompletionEvent, FinishReason, TokenStream};

/// Header telling clients which stream protocol the body speaks
pub const DATA_STREAM_HEADER: &str = "x-vercel-ai-data-stream";
pub const DATA_STREAM_VERSION: &str = "v1";
pub const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// What the stream consumer sees instead of the actual failure
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

#[inline]
pub fn text_part(text: &str) -> String {
    format!("0:{}\n", Value::String(text.to_owned()))
}

#[inline]
pub fn error_part(message: &str) -> String {
    format!("3:{}\n", Value::String(message.to_owned()))
}

#[inline]
pub fn finish_part(reason: FinishReason) -> String {
    format!("d:{}\n", json!({ "finishReason": reason.as_str() }))
}

enum EncoderState {
    Streaming {
        events: TokenStream,
        deadline: Instant,
        sent: usize,
        finish: FinishReason,
    },
    Finishing(FinishReason),
    Done,
}

/// Encode completion events as data stream parts.
///
/// The finish part carries the reason the model reported, `stop` when it
/// reported none. A failed item or a passed `deadline` ends the stream with
/// the generic error part followed by an `error` finish part; the failure
/// itself only goes to the log.
#[inline]
pub fn encode_data_stream(
    events: TokenStream,
    deadline: Instant,
) -> impl Stream<Item = String> + Send {
    let initial = EncoderState::Streaming {
        events,
        deadline,
        sent: 0,
        finish: FinishReason::Stop,
    };

    stream::unfold(initial, |state| async move {
        match state {
            EncoderState::Streaming {
                mut events,
                deadline,
                sent,
                mut finish,
            } => loop {
                match tokio::time::timeout_at(deadline, events.next()).await {
                    Ok(Some(Ok(CompletionEvent::Finished(reason)))) => finish = reason,
                    Ok(Some(Ok(CompletionEvent::Text(token)))) if token.is_empty() => {}
                    Ok(Some(Ok(CompletionEvent::Text(token)))) => {
                        let part = text_part(&token);
                        let next = EncoderState::Streaming {
                            events,
                            deadline,
                            sent: sent + 1,
                            finish,
                        };
                        return Some((part, next));
                    }
                    Ok(Some(Err(e))) => {
                        error!("Completion stream failed after {} tokens: {}", sent, e);
                        return Some((
                            error_part(INTERNAL_ERROR_MESSAGE),
                            EncoderState::Finishing(FinishReason::Error),
                        ));
                    }
                    Ok(None) => {
                        debug!(
                            "Completion finished after {} tokens ({})",
                            sent,
                            finish.as_str()
                        );
                        return Some((finish_part(finish), EncoderState::Done));
                    }
                    Err(_) => {
                        warn!("Chat response hit the request deadline after {} tokens", sent);
                        return Some((
                            error_part(INTERNAL_ERROR_MESSAGE),
                            EncoderState::Finishing(FinishReason::Error),
                        ));
                    }
                }
            },
            EncoderState::Finishing(reason) => Some((finish_part(reason), EncoderState::Done)),
            EncoderState::Done => None,
        }
    })
}

/// A 200 response whose body streams `events` until they end or `deadline` passes
#[inline]
pub fn data_stream_response(events: TokenStream, deadline: Instant) -> Response {
    let body = Body::from_stream(encode_data_stream(events, deadline).map(Ok::<_, Infallible>));
    (
        [
            (header::CONTENT_TYPE, CONTENT_TYPE),
            (HeaderName::from_static(DATA_STREAM_HEADER), DATA_STREAM_VERSION),
        ],
        body,
    )
        .into_response()
}
