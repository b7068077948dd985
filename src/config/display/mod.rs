
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use super::secrets::mask_secret;
use super::{Config, ConfigError, Secrets};

/// Print the effective configuration to stderr
#[inline]
pub fn show_config(config: &Config, secrets: &Result<Secrets, ConfigError>) {
    eprint!("{}", ConfigReport { config, secrets });
}

/// Render the configuration report shown by `config --show`
#[inline]
pub fn render_config(config: &Config, secrets: &Result<Secrets, ConfigError>) -> String {
    ConfigReport { config, secrets }.to_string()
}

/// The `config --show` report, settings first and then the environment
pub struct ConfigReport<'a> {
    pub config: &'a Config,
    pub secrets: &'a Result<Secrets, ConfigError>,
}

impl fmt::Display for ConfigReport<'_> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.config;

        writeln!(f, "{}", style("📋 Current Configuration").bold().cyan())?;
        writeln!(f)?;

        writeln!(f, "{}", style("Server:").bold().yellow())?;
        writeln!(f, "  Host: {}", style(&config.server.host).cyan())?;
        writeln!(f, "  Port: {}", style(config.server.port).cyan())?;
        writeln!(
            f,
            "  Max Duration: {}s",
            style(config.server.max_duration_seconds).cyan()
        )?;

        writeln!(f, "{}", style("OpenAI:").bold().yellow())?;
        writeln!(f, "  Base URL: {}", style(&config.openai.base_url).cyan())?;
        writeln!(
            f,
            "  Embedding Model: {} ({} dimensions)",
            style(&config.openai.embedding_model).cyan(),
            config.openai.embedding_dimension
        )?;
        writeln!(
            f,
            "  Chat Model: {} (max {} tokens)",
            style(&config.openai.chat_model).cyan(),
            config.openai.max_tokens
        )?;

        writeln!(f, "{}", style("Vector Store:").bold().yellow())?;
        writeln!(
            f,
            "  Backend: {}",
            style(format!("{:?}", config.vector_store.backend).to_lowercase()).cyan()
        )?;
        writeln!(
            f,
            "  Metric: {}",
            style(config.vector_store.metric.as_str()).cyan()
        )?;
        writeln!(f, "  Top K: {}", style(config.vector_store.top_k).cyan())?;

        writeln!(f, "{}", style("Ingestion:").bold().yellow())?;
        writeln!(
            f,
            "  Chunking: {} chars, {} overlap",
            style(config.chunking.chunk_size).cyan(),
            style(config.chunking.chunk_overlap).cyan()
        )?;
        writeln!(f, "  Concurrency: {}", style(config.ingest.concurrency).cyan())?;
        for source in &config.ingest.sources {
            writeln!(f, "  Source: {}", style(source).cyan())?;
        }

        writeln!(f, "{}", style("Environment:").bold().yellow())?;
        match self.secrets {
            Ok(secrets) => {
                writeln!(f, "  Astra URL: {}", style(&secrets.astra_url).cyan())?;
                writeln!(f, "  Keyspace: {}", style(&secrets.astra_keyspace).cyan())?;
                writeln!(f, "  Collection: {}", style(&secrets.collection).cyan())?;
                writeln!(
                    f,
                    "  Astra Token: {}",
                    style(mask_secret(&secrets.astra_token)).dim()
                )?;
                writeln!(
                    f,
                    "  OpenAI Key: {}",
                    style(mask_secret(&secrets.openai_api_key)).dim()
                )?;
            }
            Err(e) => writeln!(f, "  {}", style(e).red())?,
        }

        writeln!(f)?;
        writeln!(
            f,
            "Config file: {}",
            style(config.config_file_path().display()).dim()
        )
    }
}

/// Write a default config file into `config_dir` unless one already exists.
///
/// Returns whether a file was written.
#[inline]
pub fn init_config(config_dir: &Path) -> Result<bool> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    if config.config_file_path().exists() {
        return Ok(false);
    }
    config.save().context("Failed to save configuration")?;
    Ok(true)
}
