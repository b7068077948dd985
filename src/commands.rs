use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::chat::ChatService;
use crate::completion::OpenAiChat;
use crate::config::settings::parse_source_url;
use crate::config::{Config, Secrets, StoreBackend, get_config_dir, init_config, show_config};
use crate::crawler::page_loader;
use crate::database::{
    AstraStore, MemoryStore, SimilarityMetric, VectorOptions, VectorStore, provision_collection,
};
use crate::embeddings::{Embedder, OpenAiEmbedder};
use crate::indexer::{Indexer, IngestReport};
use crate::server::{AppState, serve};

/// The service clients both the chat route and the ingestion pipeline talk to
pub struct Services {
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
}

impl Services {
    /// Build the embedding client and the configured vector store backend
    #[inline]
    pub fn connect(config: &Config, secrets: &Secrets) -> Result<Self> {
        let embedder = OpenAiEmbedder::new(&config.openai, &secrets.openai_api_key)
            .context("Failed to create embedding client")?;

        let store: Arc<dyn VectorStore> = match config.vector_store.backend {
            StoreBackend::Astra => Arc::new(
                AstraStore::new(secrets).context("Failed to create vector store client")?,
            ),
            StoreBackend::Memory => {
                warn!("Using the in-memory vector store; nothing survives a restart");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self {
            embedder: Arc::new(embedder),
            store,
        })
    }
}

/// Show the effective configuration, or write a default config file
#[inline]
pub fn configure(show: bool) -> Result<()> {
    let config_dir = get_config_dir()?;

    if show {
        let config = Config::load(&config_dir).context("Failed to load configuration")?;
        show_config(&config, &Secrets::from_env());
        return Ok(());
    }

    if init_config(&config_dir)? {
        println!(
            "Wrote default configuration to {}",
            config_dir.join("config.toml").display()
        );
    } else {
        println!(
            "Configuration already exists at {}",
            config_dir.join("config.toml").display()
        );
    }
    println!("Use 'f1-rag config --show' to review it.");
    Ok(())
}

/// Source URLs for an ingestion run: the ones given, else the configured ones
#[inline]
pub fn resolve_sources(config: &Config, urls: &[String]) -> Result<Vec<Url>> {
    if urls.is_empty() {
        return Ok(config.ingest.source_urls()?);
    }
    urls.iter()
        .map(|url| parse_source_url(url).map_err(anyhow::Error::from))
        .collect()
}

/// Provision the collection and ingest `urls` into it
#[inline]
pub async fn run_ingestion(
    config: &Config,
    secrets: &Secrets,
    services: &Services,
    metric: SimilarityMetric,
    urls: &[Url],
) -> Result<IngestReport> {
    let loader = page_loader(&config.browser).context("Failed to create page loader")?;
    let indexer = Indexer::new(
        Arc::from(loader),
        Arc::clone(&services.embedder),
        Arc::clone(&services.store),
        secrets.collection.as_str(),
        &config.chunking,
    )?
    .with_concurrency(config.ingest.concurrency);

    let provisioned = indexer.provision(metric).await?;
    if provisioned.created {
        println!("Created collection '{}' ({})", secrets.collection, metric);
    } else {
        println!("Using existing collection '{}'", secrets.collection);
    }

    let report = indexer
        .ingest(urls)
        .await
        .context("Ingestion run aborted")?;
    Ok(report)
}

/// `f1-rag ingest`
#[inline]
pub async fn ingest(
    config: &Config,
    secrets: &Secrets,
    metric: Option<SimilarityMetric>,
    urls: &[String],
) -> Result<()> {
    let urls = resolve_sources(config, urls)?;
    let metric = metric.unwrap_or(config.vector_store.metric);
    let services = Services::connect(config, secrets)?;

    info!("Ingesting {} pages into '{}'", urls.len(), secrets.collection);
    let report = run_ingestion(config, secrets, &services, metric, &urls).await?;

    println!("Ingestion completed!");
    println!("  Pages: {}", report.pages);
    println!("  Chunks inserted: {}", report.chunks);
    Ok(())
}

/// Give an unseeded in-memory store the empty collection the chat route queries.
///
/// A remote store keeps whatever `ingest` provisioned.
#[inline]
pub async fn prepare_store(config: &Config, secrets: &Secrets, services: &Services) -> Result<()> {
    if config.vector_store.backend != StoreBackend::Memory {
        return Ok(());
    }

    let options = VectorOptions {
        dimension: services.embedder.dimension(),
        metric: config.vector_store.metric,
    };
    let provisioned = provision_collection(services.store.as_ref(), &secrets.collection, options)
        .await
        .context("Failed to provision the in-memory collection")?;
    if provisioned.created {
        warn!(
            "Serving from an empty in-memory collection '{}'; answers will have no context",
            secrets.collection
        );
    }
    Ok(())
}

/// `f1-rag serve`
#[inline]
pub async fn serve_chat(config: Config, secrets: &Secrets, seed: bool) -> Result<()> {
    let services = Services::connect(&config, secrets)?;

    if seed {
        let urls = config.ingest.source_urls()?;
        let report = run_ingestion(
            &config,
            secrets,
            &services,
            config.vector_store.metric,
            &urls,
        )
        .await?;
        info!(
            "Seeded '{}' with {} chunks before serving",
            secrets.collection, report.chunks
        );
    } else {
        prepare_store(&config, secrets, &services).await?;
    }

    let model = OpenAiChat::new(&config.openai, &secrets.openai_api_key)
        .context("Failed to create completion client")?;
    let chat = ChatService::new(
        services.embedder,
        services.store,
        Arc::new(model),
        secrets.collection.as_str(),
        config.vector_store.top_k,
    );

    serve(Arc::new(AppState::new(config, chat))).await
}
