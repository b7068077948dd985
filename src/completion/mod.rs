// Completion module
// Chat message types and the streaming chat completion client

pub mod openai;

#[cfg(test)]
mod tests;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use openai::OpenAiChat;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FinishReason {
    #[default]
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Error,
    Other,
}

impl FinishReason {
    /// Map an OpenAI `finish_reason` value
    #[inline]
    pub fn from_openai(reason: &str) -> Self {
        match reason {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "content_filter" => Self::ContentFilter,
            "tool_calls" | "function_call" => Self::ToolCalls,
            _ => Self::Other,
        }
    }

    /// Name used in the `finishReason` field of a data stream
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ContentFilter => "content-filter",
            Self::ToolCalls => "tool-calls",
            Self::Error => "error",
            Self::Other => "other",
        }
    }
}

/// One item of a streamed completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionEvent {
    /// A text delta
    Text(String),
    /// The model reported why it stopped
    Finished(FinishReason),
}

/// Completion events in arrival order. An `Err` item ends the stream.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<CompletionEvent>> + Send>>;

/// A language model that streams its answer
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Start a completion for `messages`.
    ///
    /// An `Err` here means the request was rejected before anything was streamed.
    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> Result<TokenStream>;
}
