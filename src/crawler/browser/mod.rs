
use std::ffi::OsStr;
use std::time::{Duration, Instant};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use super::PageLoader;
use crate::{RagError, Result};

static CHROME_ARGS: [&str; 5] = [
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-extensions",
    "--disable-images",
];

/// Extra time granted to browser startup and teardown on top of the navigation timeout
const LAUNCH_GRACE_SECONDS: u64 = 15;

/// Configuration for headless page rendering
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BrowserConfig {
    /// Render pages in headless Chrome; when false pages are fetched over plain HTTP
    pub render_javascript: bool,
    /// Whether to run the browser without a window
    pub headless: bool,
    /// Timeout for page navigation in seconds
    pub navigation_timeout_seconds: u64,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
}

impl Default for BrowserConfig {
    #[inline]
    fn default() -> Self {
        Self {
            render_javascript: true,
            headless: true,
            navigation_timeout_seconds: 30,
            window_width: 1280,
            window_height: 720,
        }
    }
}

impl BrowserConfig {
    #[inline]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_seconds)
    }

    fn launch_options(&self) -> LaunchOptions<'static> {
        LaunchOptions {
            headless: self.headless,
            window_size: Some((self.window_width, self.window_height)),
            args: CHROME_ARGS.iter().map(|arg| OsStr::new(*arg)).collect(),
            idle_browser_timeout: self.navigation_timeout() + Duration::from_secs(LAUNCH_GRACE_SECONDS),
            ..Default::default()
        }
    }
}

/// Result of rendering a page with a browser
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// The URL that was rendered
    pub url: Url,
    /// The rendered HTML of the document
    pub content: String,
    /// Time taken to render the page
    pub render_time: Duration,
}

/// Loads pages in a fresh headless Chrome instance.
///
/// headless_chrome is synchronous, so every render runs on the blocking pool
/// and the browser is torn down once the HTML has been read.
#[derive(Debug, Clone, Default)]
pub struct BrowserClient {
    config: BrowserConfig,
}

impl BrowserClient {
    #[inline]
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    /// Render a URL and return the HTML once the document has loaded
    #[inline]
    pub async fn render_page(&self, url: &Url) -> Result<RenderedPage> {
        let config = self.config.clone();
        let target = url.clone();
        let deadline = config.navigation_timeout() + Duration::from_secs(LAUNCH_GRACE_SECONDS);

        let task = tokio::task::spawn_blocking(move || render_blocking(&config, &target));

        let page = tokio::time::timeout(deadline, task)
            .await
            .map_err(|_| {
                RagError::Scrape(format!("Rendering {url} did not finish within {deadline:?}"))
            })?
            .map_err(|e| RagError::Scrape(format!("Browser task for {url} failed: {e}")))?
            .map_err(|e| RagError::Scrape(format!("{e:#}")))?;

        info!(
            "Rendered {} ({} bytes, took {:?})",
            page.url,
            page.content.len(),
            page.render_time
        );
        Ok(page)
    }
}

fn render_blocking(config: &BrowserConfig, url: &Url) -> anyhow::Result<RenderedPage> {
    let start_time = Instant::now();

    let browser = Browser::new(config.launch_options()).context("Failed to launch browser")?;
    let tab = browser.new_tab().context("Failed to create browser tab")?;
    tab.set_default_timeout(config.navigation_timeout());

    debug!("Navigating to URL: {}", url);
    tab.navigate_to(url.as_str())
        .with_context(|| format!("Failed to navigate to {url}"))?
        .wait_until_navigated()
        .map_err(|e| anyhow!("Navigation to {url} did not complete: {e}"))?;

    let content = tab.get_content().context("Failed to get page content")?;

    if let Err(e) = tab.close(true) {
        debug!("Failed to close tab for {}: {}", url, e);
    }

    Ok(RenderedPage {
        url: url.clone(),
        content,
        render_time: start_time.elapsed(),
    })
}

#[async_trait]
impl PageLoader for BrowserClient {
    async fn load_html(&self, url: &Url) -> Result<String> {
        Ok(self.render_page(url).await?.content)
    }
}
