use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use f1_rag::commands::{configure, ingest, serve_chat};
use f1_rag::config::{Config, Secrets, get_config_dir};
use f1_rag::database::SimilarityMetric;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "f1-rag")]
#[command(about = "Retrieval-augmented Formula 1 chat with an offline ingestion pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the chat server
    Serve {
        /// Run the ingestion pipeline before serving, e.g. to fill the in-memory store
        #[arg(long)]
        seed: bool,
    },
    /// Scrape, chunk and embed the source pages into the vector collection
    Ingest {
        /// Similarity metric used when the collection has to be created
        #[arg(long)]
        metric: Option<SimilarityMetric>,
        /// Page to ingest instead of the configured sources; may be repeated
        #[arg(long = "url")]
        urls: Vec<String>,
    },
    /// Write a default config file, or show the effective configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

fn load_settings() -> Result<(Config, Secrets)> {
    let config = Config::load(get_config_dir()?).context("Failed to load configuration")?;
    let secrets = Secrets::from_env().context("Required environment is not set")?;
    Ok((config, secrets))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { seed } => {
            let (config, secrets) = load_settings()?;
            serve_chat(config, &secrets, seed).await?;
        }
        Commands::Ingest { metric, urls } => {
            let (config, secrets) = load_settings()?;
            ingest(&config, &secrets, metric, &urls).await?;
        }
        Commands::Config { show } => {
            configure(show)?;
        }
    }

    Ok(())
}
