
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{ChunkMatch, CollectionInfo, NewChunk, SimilarityMetric, VectorOptions, VectorStore};
use crate::{RagError, Result};

#[derive(Debug)]
struct StoredChunk {
    id: String,
    text: String,
    vector: Vec<f32>,
}

#[derive(Debug)]
struct MemoryCollection {
    options: VectorOptions,
    chunks: Vec<StoredChunk>,
}

/// Process-local vector store with exact similarity search
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chunks stored in `collection`, `None` if it does not exist
    #[inline]
    pub async fn len(&self, collection: &str) -> Option<usize> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.chunks.len())
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let collections = self.collections.read().await;
        let mut infos: Vec<CollectionInfo> = collections
            .iter()
            .map(|(name, collection)| CollectionInfo {
                name: name.clone(),
                vector: Some(collection.options),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    async fn create_collection(&self, name: &str, options: VectorOptions) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(RagError::VectorStore(format!(
                "Collection '{name}' already exists"
            )));
        }
        collections.insert(
            name.to_string(),
            MemoryCollection {
                options,
                chunks: Vec::new(),
            },
        );
        Ok(())
    }

    async fn insert_chunk(&self, collection: &str, chunk: NewChunk) -> Result<String> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| unknown_collection(collection))?;

        if chunk.vector.len() != target.options.dimension {
            return Err(RagError::VectorStore(format!(
                "Vector has {} dimensions, collection '{}' expects {}",
                chunk.vector.len(),
                collection,
                target.options.dimension
            )));
        }

        let id = Uuid::new_v4().to_string();
        target.chunks.push(StoredChunk {
            id: id.clone(),
            text: chunk.text,
            vector: chunk.vector,
        });
        debug!("Stored chunk {} in '{}'", id, collection);
        Ok(id)
    }

    async fn find_similar(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkMatch>> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| unknown_collection(collection))?;

        if vector.len() != target.options.dimension {
            return Err(RagError::VectorStore(format!(
                "Query vector has {} dimensions, collection '{}' expects {}",
                vector.len(),
                collection,
                target.options.dimension
            )));
        }

        let mut scored: Vec<(f32, &StoredChunk)> = target
            .chunks
            .iter()
            .map(|chunk| (similarity(target.options.metric, vector, &chunk.vector), chunk))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, chunk)| ChunkMatch {
                id: chunk.id.clone(),
                text: chunk.text.clone(),
                similarity: Some(score),
            })
            .collect())
    }
}

fn unknown_collection(name: &str) -> RagError {
    RagError::VectorStore(format!("Collection '{name}' does not exist"))
}

/// Higher is more similar for every metric
pub(crate) fn similarity(metric: SimilarityMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        SimilarityMetric::DotProduct => dot(a, b),
        SimilarityMetric::Cosine => {
            let norms = dot(a, a).sqrt() * dot(b, b).sqrt();
            if norms == 0.0 { 0.0 } else { dot(a, b) / norms }
        }
        SimilarityMetric::Euclidean => {
            let squared: f32 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
            1.0 / (1.0 + squared)
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
