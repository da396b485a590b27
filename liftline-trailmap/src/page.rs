//! Rendered map-page snapshots.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use liftline_browser::BrowserLifecycleManager;
use liftline_cache::ConcurrencyLimiter;
use liftline_core::{constants::NAVIGATION_TIMEOUT, BrowserPage, LiftlineError, Result};

const READ_IMAGES: &str = "Array.from(document.images).map(i => ({ \
    src: i.currentSrc || i.src || '', \
    srcset: i.getAttribute('srcset'), \
    alt: i.getAttribute('alt') }))";

/// One rendered `<img>` element.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    /// Resolved `src`
    pub src: String,
    /// Raw `srcset` attribute
    #[serde(default)]
    pub srcset: Option<String>,
    /// `alt` text
    #[serde(default)]
    pub alt: Option<String>,
}

/// What discovery needs from a loaded page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageSnapshot {
    /// Final page URL, used to resolve relative links
    pub url: String,
    /// Rendered images in document order
    pub images: Vec<PageImage>,
    /// Page markup after scripts ran
    pub html: String,
}

/// Loads a map page.
#[async_trait]
pub trait PageLoader: Send + Sync {
    /// Loads `url` and returns its images and markup.
    async fn load(&self, url: &str) -> Result<PageSnapshot>;
}

/// Loads pages through the shared browser, counted against the scrape
/// ceiling.
pub struct BrowserPageLoader {
    browser: Arc<BrowserLifecycleManager>,
    limiter: ConcurrencyLimiter,
    navigation_timeout: Duration,
}

impl BrowserPageLoader {
    /// Creates a loader.
    pub fn new(browser: Arc<BrowserLifecycleManager>, limiter: ConcurrencyLimiter) -> Self {
        Self {
            browser,
            limiter,
            navigation_timeout: NAVIGATION_TIMEOUT,
        }
    }

    /// Overrides the navigation timeout.
    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    async fn snapshot(&self, page: &dyn BrowserPage, url: &str) -> Result<PageSnapshot> {
        page.goto(url, self.navigation_timeout).await?;
        let images = page.evaluate(READ_IMAGES).await?;
        let images: Vec<PageImage> = serde_json::from_value(images)?;
        let html = page.content().await?;
        Ok(PageSnapshot {
            url: url.to_string(),
            images,
            html,
        })
    }
}

#[async_trait]
impl PageLoader for BrowserPageLoader {
    #[instrument(skip(self))]
    async fn load(&self, url: &str) -> Result<PageSnapshot> {
        let _permit = self.limiter.admit(url)?;
        let session = self.browser.ensure().await?;
        let page = session.new_page().await.map_err(|e| {
            self.browser.report_failure();
            e
        })?;

        let result = self.snapshot(page.as_ref(), url).await;
        if let Err(e) = page.close().await {
            warn!(url, error = %e, "Page close failed");
        }

        match &result {
            Ok(snapshot) => debug!(url, images = snapshot.images.len(), "Map page loaded"),
            Err(e) => {
                warn!(url, error = %e, "Map page load failed");
                self.browser.report_failure();
            }
        }
        result.map_err(|e| match e {
            LiftlineError::JsonError(msg) => LiftlineError::FetchFailed(format!("unreadable image list: {}", msg)),
            other => other,
        })
    }
}
