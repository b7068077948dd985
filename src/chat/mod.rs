// Chat module
// Question validation, retrieval and prompt assembly for the chat route

pub mod prompt;


use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::RagError;
use crate::completion::{ChatMessage, ChatModel, TokenStream};
use crate::database::{ChunkMatch, VectorStore};
use crate::embeddings::Embedder;

pub use prompt::system_prompt;

/// Why a chat request did not produce a stream.
///
/// The display strings are what the client sees; details stay in the logs.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Invalid question")]
    InvalidQuestion,
    #[error("Failed to generate embedding")]
    EmbeddingUnavailable,
    #[error("Internal Server Error")]
    Internal(#[source] RagError),
}

impl From<RagError> for ChatError {
    #[inline]
    fn from(error: RagError) -> Self {
        Self::Internal(error)
    }
}

/// A validated chat request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// The conversation as sent by the client
    pub messages: Vec<ChatMessage>,
    /// Content of the last message
    pub question: String,
}

impl ChatRequest {
    /// Validate a raw request body of the form `{"messages": [{role, content}, ...]}`.
    ///
    /// The last message must carry non-empty string content and every message
    /// must have a known role and string content.
    #[inline]
    pub fn parse(body: &[u8]) -> Result<Self, ChatError> {
        let value: Value = serde_json::from_slice(body).map_err(|e| {
            debug!("Chat body is not JSON: {}", e);
            ChatError::InvalidQuestion
        })?;

        let raw_messages = value
            .get("messages")
            .and_then(Value::as_array)
            .ok_or(ChatError::InvalidQuestion)?;

        let question = raw_messages
            .last()
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .filter(|content| !content.is_empty())
            .ok_or(ChatError::InvalidQuestion)?
            .to_string();

        let messages = raw_messages
            .iter()
            .map(|m| serde_json::from_value::<ChatMessage>(m.clone()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                debug!("Rejected chat message: {}", e);
                ChatError::InvalidQuestion
            })?;

        Ok(Self { messages, question })
    }
}

/// Join retrieved chunk texts into the prompt context
#[inline]
pub fn build_context(matches: &[ChunkMatch]) -> String {
    matches
        .iter()
        .map(|m| m.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Retrieval-augmented answering over one collection
pub struct ChatService {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    model: Arc<dyn ChatModel>,
    collection: String,
    top_k: usize,
}

impl ChatService {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        model: Arc<dyn ChatModel>,
        collection: impl Into<String>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            model,
            collection: collection.into(),
            top_k,
        }
    }

    /// The `top_k` chunks nearest to `question`
    #[inline]
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ChunkMatch>, ChatError> {
        let vector = match self.embedder.embed(question).await {
            Ok(Some(vector)) => vector,
            Ok(None) => {
                warn!("No usable embedding for the question, skipping retrieval");
                return Err(ChatError::EmbeddingUnavailable);
            }
            Err(e) => {
                error!("Embedding the question failed: {}", e);
                return Err(e.into());
            }
        };

        let matches = self
            .store
            .find_similar(&self.collection, &vector, self.top_k)
            .await
            .map_err(|e| {
                error!("Similarity query on '{}' failed: {}", self.collection, e);
                ChatError::from(e)
            })?;

        debug!(
            "Retrieved {} chunks: {:?}",
            matches.len(),
            matches.iter().map(|m| m.id.as_str()).collect::<Vec<_>>()
        );
        Ok(matches)
    }

    /// The messages sent to the model: the system prompt, then the conversation
    #[inline]
    pub fn completion_messages(request: &ChatRequest, context: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(ChatMessage::system(system_prompt(context, &request.question)));
        messages.extend(request.messages.iter().cloned());
        messages
    }

    /// Retrieve context for the question and start streaming the answer
    #[inline]
    pub async fn answer(&self, request: &ChatRequest) -> Result<TokenStream, ChatError> {
        let matches = self.retrieve(&request.question).await?;
        let context = build_context(&matches);
        let messages = Self::completion_messages(request, &context);

        self.model.stream_chat(messages).await.map_err(|e| {
            error!("Completion request failed: {}", e);
            ChatError::from(e)
        })
    }
}
