
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, warn};
use url::Url;

use super::{ChunkMatch, CollectionInfo, NewChunk, SimilarityMetric, VectorOptions, VectorStore};
use crate::config::Secrets;
use crate::{RagError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Vector store speaking the Astra JSON Data API
#[derive(Debug, Clone)]
pub struct AstraStore {
    client: reqwest::Client,
    keyspace_url: Url,
    token: String,
}

#[derive(Debug, Deserialize)]
struct CommandResponse {
    #[serde(default)]
    status: Option<CommandStatus>,
    #[serde(default)]
    data: Option<FindData>,
    #[serde(default)]
    errors: Vec<CommandError>,
}

#[derive(Debug, Default, Deserialize)]
struct CommandStatus {
    #[serde(default)]
    collections: Vec<RawCollection>,
    #[serde(default, rename = "insertedIds")]
    inserted_ids: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawCollection {
    name: String,
    #[serde(default)]
    options: Option<RawCollectionOptions>,
}

#[derive(Debug, Deserialize)]
struct RawCollectionOptions {
    #[serde(default)]
    vector: Option<RawVectorOptions>,
}

#[derive(Debug, Deserialize)]
struct RawVectorOptions {
    dimension: Option<usize>,
    metric: Option<SimilarityMetric>,
}

#[derive(Debug, Deserialize)]
struct FindData {
    #[serde(default)]
    documents: Vec<RawDocument>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(rename = "_id")]
    id: Value,
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "$similarity")]
    similarity: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct CommandError {
    message: String,
    #[serde(default, rename = "errorCode")]
    error_code: Option<String>,
}

impl AstraStore {
    #[inline]
    pub fn new(secrets: &Secrets) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
            .build()?;
        Self::with_client(
            client,
            &secrets.astra_url,
            &secrets.astra_keyspace,
            &secrets.astra_token,
        )
    }

    /// Build a store on top of an existing HTTP client
    #[inline]
    pub fn with_client(
        client: reqwest::Client,
        api_endpoint: &str,
        keyspace: &str,
        token: &str,
    ) -> Result<Self> {
        let url_str = format!(
            "{}/api/json/v1/{}",
            api_endpoint.trim_end_matches('/'),
            keyspace
        );
        let keyspace_url = Url::parse(&url_str)
            .map_err(|e| RagError::Config(format!("Invalid Data API URL '{url_str}': {e}")))?;

        Ok(Self {
            client,
            keyspace_url,
            token: token.to_string(),
        })
    }

    fn collection_url(&self, collection: &str) -> Result<Url> {
        let url_str = format!("{}/{}", self.keyspace_url, collection);
        Url::parse(&url_str)
            .map_err(|e| RagError::Config(format!("Invalid collection URL '{url_str}': {e}")))
    }

    async fn command(&self, url: Url, body: Value) -> Result<CommandResponse> {
        debug!("Data API command to {}", url);

        let response = self
            .client
            .post(url)
            .header("Token", &self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Data API returned HTTP {}: {}", status, body);
            return Err(RagError::VectorStore(format!(
                "Data API returned HTTP {status}"
            )));
        }

        let parsed: CommandResponse = response.json().await?;
        if !parsed.errors.is_empty() {
            let messages: Vec<String> = parsed
                .errors
                .iter()
                .map(|e| match &e.error_code {
                    Some(code) => format!("{code}: {}", e.message),
                    None => e.message.clone(),
                })
                .collect();
            error!("Data API command failed: {}", messages.join("; "));
            return Err(RagError::VectorStore(messages.join("; ")));
        }

        Ok(parsed)
    }
}

#[async_trait]
impl VectorStore for AstraStore {
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let response = self
            .command(
                self.keyspace_url.clone(),
                json!({ "findCollections": { "options": { "explain": true } } }),
            )
            .await?;

        let collections = response.status.unwrap_or_default().collections;
        Ok(collections
            .into_iter()
            .map(|raw| CollectionInfo {
                vector: raw
                    .options
                    .and_then(|o| o.vector)
                    .and_then(|v| {
                        v.dimension.map(|dimension| VectorOptions {
                            dimension,
                            // the Data API defaults to cosine when no metric was given
                            metric: v.metric.unwrap_or(SimilarityMetric::Cosine),
                        })
                    }),
                name: raw.name,
            })
            .collect())
    }

    async fn create_collection(&self, name: &str, options: VectorOptions) -> Result<()> {
        self.command(
            self.keyspace_url.clone(),
            json!({
                "createCollection": {
                    "name": name,
                    "options": {
                        "vector": {
                            "dimension": options.dimension,
                            "metric": options.metric.as_str(),
                        }
                    }
                }
            }),
        )
        .await?;
        Ok(())
    }

    async fn insert_chunk(&self, collection: &str, chunk: NewChunk) -> Result<String> {
        let response = self
            .command(
                self.collection_url(collection)?,
                json!({
                    "insertOne": {
                        "document": {
                            "$vector": chunk.vector,
                            "text": chunk.text,
                        }
                    }
                }),
            )
            .await?;

        response
            .status
            .and_then(|s| s.inserted_ids.into_iter().next())
            .map(document_id)
            .ok_or_else(|| RagError::VectorStore("insertOne returned no inserted id".to_string()))
    }

    async fn find_similar(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkMatch>> {
        let response = self
            .command(
                self.collection_url(collection)?,
                json!({
                    "find": {
                        "filter": {},
                        "sort": { "$vector": vector },
                        "options": { "limit": limit, "includeSimilarity": true }
                    }
                }),
            )
            .await?;

        let documents = response.data.map(|d| d.documents).unwrap_or_default();
        debug!("Found {} documents in '{}'", documents.len(), collection);

        Ok(documents
            .into_iter()
            .map(|doc| {
                let id = document_id(doc.id);
                let text = doc.text.unwrap_or_else(|| {
                    warn!("Document {} has no text field", id);
                    String::new()
                });
                ChunkMatch {
                    id,
                    text,
                    similarity: doc.similarity,
                }
            })
            .collect())
    }
}

/// Document ids are plain strings unless the collection uses typed ids such as `{"$uuid": ".."}`
fn document_id(value: Value) -> String {
    match value {
        Value::String(id) => id,
        Value::Object(map) if map.len() == 1 => {
            let inner = map.values().next().and_then(Value::as_str).map(str::to_string);
            inner.unwrap_or_else(|| Value::Object(map).to_string())
        }
        other => other.to_string(),
    }
}
