// Crawler module
// Page loading (headless Chrome or plain HTTP) and text extraction

pub mod browser;
pub mod extractor;


use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info};
use url::Url;

use crate::{RagError, Result};

pub use browser::{BrowserClient, BrowserConfig};
pub use extractor::extract_text;

const USER_AGENT: &str = concat!("f1-rag/", env!("CARGO_PKG_VERSION"));

/// Something that can turn a URL into the HTML of the loaded page
#[async_trait]
pub trait PageLoader: Send + Sync {
    async fn load_html(&self, url: &Url) -> Result<String>;
}

/// Fetches pages over plain HTTP without running their scripts
#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: reqwest::Client,
}

impl HttpLoader {
    #[inline]
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageLoader for HttpLoader {
    async fn load_html(&self, url: &Url) -> Result<String> {
        debug!("Making HTTP GET request to: {}", url);

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            error!("HTTP {} when fetching {}", status, url);
            return Err(RagError::Scrape(format!("HTTP {status} when fetching {url}")));
        }

        Ok(response.text().await?)
    }
}

/// Build the loader selected by `config`
#[inline]
pub fn page_loader(config: &BrowserConfig) -> Result<Box<dyn PageLoader>> {
    if config.render_javascript {
        Ok(Box::new(BrowserClient::new(config.clone())))
    } else {
        Ok(Box::new(HttpLoader::new(config.navigation_timeout())?))
    }
}

/// Load `url` and return its cleaned text
#[inline]
pub async fn scrape_page(loader: &dyn PageLoader, url: &Url) -> Result<String> {
    let html = loader.load_html(url).await?;
    let text = extract_text(&html)?;
    info!(
        "Scraped {} ({} characters of text)",
        url,
        text.chars().count()
    );
    Ok(text)
}
