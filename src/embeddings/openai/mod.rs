
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};
use url::Url;

use super::Embedder;
use crate::config::OpenAiConfig;
use crate::{RagError, Result};

/// Vector length of `text-embedding-3-small`
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

/// Client for the OpenAI `/embeddings` endpoint
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    url: Url,
    api_key: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    encoding_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl OpenAiEmbedder {
    #[inline]
    pub fn new(config: &OpenAiConfig, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Self::with_client(client, config, api_key)
    }

    #[inline]
    pub fn with_client(client: reqwest::Client, config: &OpenAiConfig, api_key: &str) -> Result<Self> {
        let url = config
            .api_url("embeddings")
            .map_err(|e| RagError::Config(e.to_string()))?;

        Ok(Self {
            client,
            url,
            api_key: api_key.to_string(),
            model: config.embedding_model.clone(),
            dimension: config.embedding_dimension,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>> {
        debug!("Requesting embedding for text (length: {})", text.len());

        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
            encoding_format: "float",
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
            error!("Embedding request failed with HTTP {}: {}", status, message);
            return Err(RagError::Embedding(format!(
                "Embedding request failed ({status}): {message}"
            )));
        }

        let body: Value = response.json().await?;
        let vector = vector_from_response(&body, self.dimension);
        match &vector {
            Some(v) => debug!("Received embedding with {} dimensions", v.len()),
            None => warn!("Embedding response carried no usable vector"),
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Pull `data[0].embedding` out of a response body.
///
/// Anything but a non-empty array of `expected` numbers yields `None`.
pub(crate) fn vector_from_response(body: &Value, expected: usize) -> Option<Vec<f32>> {
    let values = body
        .get("data")?
        .get(0)?
        .get("embedding")?
        .as_array()?;

    if values.is_empty() || values.len() != expected {
        return None;
    }

    values
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}
