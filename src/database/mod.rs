// Vector store module
// A trait over the collection operations plus the Astra Data API and in-memory backends

pub mod astra;
pub mod memory;


use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Result;

pub use astra::AstraStore;
pub use memory::MemoryStore;

/// Similarity function a collection ranks vectors with, fixed at creation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    Cosine,
    Euclidean,
    #[default]
    DotProduct,
}

impl SimilarityMetric {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::DotProduct => "dot_product",
        }
    }
}

impl fmt::Display for SimilarityMetric {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimilarityMetric {
    type Err = String;

    #[inline]
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cosine" => Ok(Self::Cosine),
            "euclidean" => Ok(Self::Euclidean),
            "dot_product" => Ok(Self::DotProduct),
            other => Err(format!(
                "unknown similarity metric '{other}' (expected cosine, euclidean or dot_product)"
            )),
        }
    }
}

/// Vector options of a collection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VectorOptions {
    pub dimension: usize,
    pub metric: SimilarityMetric,
}

/// A collection as reported by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    /// `None` for collections created without vector support
    pub vector: Option<VectorOptions>,
}

/// A chunk ready to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewChunk {
    pub text: String,
    pub vector: Vec<f32>,
}

/// A chunk returned by a similarity query
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkMatch {
    pub id: String,
    pub text: String,
    pub similarity: Option<f32>,
}

/// Operations the ingestion pipeline and the chat route need from a vector store
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>>;

    async fn create_collection(&self, name: &str, options: VectorOptions) -> Result<()>;

    /// Insert one chunk and return the id the store assigned to it
    async fn insert_chunk(&self, collection: &str, chunk: NewChunk) -> Result<String>;

    /// The `limit` chunks nearest to `vector`, best match first
    async fn find_similar(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkMatch>>;
}

/// Outcome of [`provision_collection`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub info: CollectionInfo,
    pub created: bool,
}

/// Create `name` with `options` unless a collection with that name exists.
///
/// An existing collection is returned as reported by the store, even when its
/// options differ from the requested ones.
#[inline]
pub async fn provision_collection(
    store: &dyn VectorStore,
    name: &str,
    options: VectorOptions,
) -> Result<Provisioned> {
    let collections = store.list_collections().await?;
    debug!("Store reports {} collections", collections.len());

    if let Some(existing) = collections.into_iter().find(|c| c.name == name) {
        info!("Collection '{}' already exists", name);
        return Ok(Provisioned {
            info: existing,
            created: false,
        });
    }

    store.create_collection(name, options).await?;
    info!(
        "Collection '{}' created ({} dimensions, {})",
        name, options.dimension, options.metric
    );

    Ok(Provisioned {
        info: CollectionInfo {
            name: name.to_string(),
            vector: Some(options),
        },
        created: true,
    })
}
