// Indexer module
// Provisions the collection and runs scrape -> chunk -> embed -> insert


use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info};
use url::Url;

use crate::crawler::{PageLoader, scrape_page};
use crate::database::{NewChunk, Provisioned, SimilarityMetric, VectorOptions, VectorStore};
use crate::embeddings::chunking::{ChunkingConfig, RecursiveSplitter};
use crate::embeddings::Embedder;
use crate::{RagError, Result};

/// Populates a vector collection from a list of web pages
pub struct Indexer {
    loader: Arc<dyn PageLoader>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    splitter: RecursiveSplitter,
    collection: String,
    concurrency: usize,
}

/// Summary of a completed ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub pages: usize,
    pub chunks: usize,
    /// Ids assigned by the store, in insertion order
    pub inserted_ids: Vec<String>,
}

impl Indexer {
    #[inline]
    pub fn new(
        loader: Arc<dyn PageLoader>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        chunking: &ChunkingConfig,
    ) -> Result<Self> {
        Ok(Self {
            loader,
            embedder,
            store,
            splitter: RecursiveSplitter::new(chunking)?,
            collection: collection.into(),
            concurrency: 1,
        })
    }

    /// Number of chunks embedded and inserted at once; 1 keeps the run strictly sequential
    #[inline]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Create the collection unless it exists, sized for the embedder's vectors
    #[inline]
    pub async fn provision(&self, metric: SimilarityMetric) -> Result<Provisioned> {
        let options = VectorOptions {
            dimension: self.embedder.dimension(),
            metric,
        };
        crate::database::provision_collection(self.store.as_ref(), &self.collection, options)
            .await
    }

    /// Provision the collection, then ingest `urls` in order
    #[inline]
    pub async fn run(&self, urls: &[Url], metric: SimilarityMetric) -> Result<IngestReport> {
        self.provision(metric).await?;
        self.ingest(urls).await
    }

    /// Scrape, chunk, embed and insert every page.
    ///
    /// The first failure aborts the run; chunks inserted before it stay in the store.
    #[inline]
    pub async fn ingest(&self, urls: &[Url]) -> Result<IngestReport> {
        let bar = progress_bar();
        let mut report = IngestReport::default();

        for url in urls {
            bar.set_message(url.to_string());

            let result = self.ingest_page(url, &bar).await;
            match result {
                Ok(ids) => {
                    report.pages += 1;
                    report.chunks += ids.len();
                    report.inserted_ids.extend(ids);
                }
                Err(e) => {
                    bar.abandon();
                    error!("Ingestion of {} failed: {}", url, e);
                    return Err(e);
                }
            }
        }

        bar.finish_and_clear();
        info!(
            "Ingested {} chunks from {} pages into '{}'",
            report.chunks, report.pages, self.collection
        );
        Ok(report)
    }

    async fn ingest_page(&self, url: &Url, bar: &ProgressBar) -> Result<Vec<String>> {
        let text = scrape_page(self.loader.as_ref(), url).await?;
        let chunks = self.splitter.split_text(&text);
        debug!("{} split into {} chunks", url, chunks.len());
        bar.inc_length(chunks.len() as u64);

        if self.concurrency == 1 {
            let mut ids = Vec::with_capacity(chunks.len());
            for chunk in chunks {
                ids.push(self.ingest_chunk(chunk).await?);
                bar.inc(1);
            }
            return Ok(ids);
        }

        futures::stream::iter(chunks)
            .map(|chunk| async move {
                let id = self.ingest_chunk(chunk).await;
                bar.inc(1);
                id
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await
    }

    async fn ingest_chunk(&self, text: String) -> Result<String> {
        let vector = self.embedder.embed(&text).await?.ok_or_else(|| {
            RagError::Embedding(format!(
                "Embedding service returned no usable vector for a chunk of {} characters",
                text.chars().count()
            ))
        })?;

        let length = text.chars().count();
        let id = self
            .store
            .insert_chunk(&self.collection, NewChunk { text, vector })
            .await?;
        info!("Inserted chunk of {} characters with ID: {}", length, id);
        Ok(id)
    }
}

fn progress_bar() -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{pos}/{len}] Ingesting {msg}") {
        bar.set_style(style);
    }
    bar
}
