//! Terrain status scrape through the shared browser.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, instrument, warn};

use liftline_browser::BrowserLifecycleManager;
use liftline_cache::ConcurrencyLimiter;
use liftline_core::{
    constants::{FEED_WAIT_TIMEOUT, NAVIGATION_TIMEOUT},
    lift_count, normalize_key, BrowserPage, LiftlineError, ResortFeed, Result,
};

use crate::resorts::terrain_url;

const FEED_READY: &str = "typeof FR !== 'undefined' && !!FR.TerrainStatusFeed";
const FEED_VALUE: &str = "(typeof FR !== 'undefined' && FR.TerrainStatusFeed) || null";

/// Page timeouts for a scrape.
#[derive(Clone, Copy, Debug)]
pub struct TerrainScraperConfig {
    /// Limit on the DOM-content load
    pub navigation_timeout: Duration,
    /// Limit on waiting for the feed object to appear
    pub feed_timeout: Duration,
}

impl Default for TerrainScraperConfig {
    fn default() -> Self {
        Self {
            navigation_timeout: NAVIGATION_TIMEOUT,
            feed_timeout: FEED_WAIT_TIMEOUT,
        }
    }
}

/// Reads `FR.TerrainStatusFeed` from a resort's terrain page.
#[derive(Clone)]
pub struct TerrainScraper {
    browser: Arc<BrowserLifecycleManager>,
    limiter: ConcurrencyLimiter,
    config: TerrainScraperConfig,
}

impl TerrainScraper {
    /// Creates a scraper sharing `browser` and `limiter` with other fetchers.
    pub fn new(
        browser: Arc<BrowserLifecycleManager>,
        limiter: ConcurrencyLimiter,
        config: TerrainScraperConfig,
    ) -> Self {
        Self {
            browser,
            limiter,
            config,
        }
    }

    /// Scrapes one resort.
    ///
    /// Returns `Ok(None)` when the page loaded but carried no feed. Fails with
    /// `UnknownResort` for keys outside the table and `Unavailable` when the
    /// concurrency ceiling is reached.
    #[instrument(skip(self))]
    pub async fn scrape(&self, resort: &str) -> Result<Option<ResortFeed>> {
        let resort = normalize_key(resort);
        let url = terrain_url(&resort).ok_or_else(|| LiftlineError::UnknownResort(resort.clone()))?;

        let _permit = self.limiter.admit(&resort)?;
        let session = self.browser.ensure().await?;
        let page = match session.new_page().await {
            Ok(page) => page,
            Err(e) => {
                self.browser.report_failure();
                return Err(e);
            }
        };

        let result = self.read_feed(page.as_ref(), url).await;
        if let Err(e) = page.close().await {
            warn!(resort = %resort, error = %e, "Page close failed");
        }

        match result {
            Ok(Value::Null) => {
                warn!(resort = %resort, "FR.TerrainStatusFeed not found");
                Ok(None)
            }
            Ok(feed) => {
                info!(resort = %resort, lifts = lift_count(&feed), "Scraped {} lifts", lift_count(&feed));
                Ok(Some(Arc::new(feed)))
            }
            Err(e) => {
                warn!(resort = %resort, error = %e, "Scrape failed");
                self.browser.report_failure();
                Err(e)
            }
        }
    }

    async fn read_feed(&self, page: &dyn BrowserPage, url: &str) -> Result<Value> {
        page.goto(url, self.config.navigation_timeout).await?;
        page.wait_for_function(FEED_READY, self.config.feed_timeout).await?;
        page.evaluate(FEED_VALUE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use liftline_core::{BrowserLauncher, BrowserSession};
    use serde_json::json;

    #[derive(Default)]
    struct Counters {
        pages_opened: AtomicUsize,
        pages_closed: AtomicUsize,
        polls: AtomicUsize,
    }

    #[derive(Clone)]
    enum Behavior {
        /// Feed becomes available after this many readiness polls
        Feed(Value, usize),
        /// Navigation fails
        NavigationError,
        /// Feed never appears
        NeverReady,
    }

    struct MockPage {
        behavior: Behavior,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl BrowserPage for MockPage {
        async fn goto(&self, _url: &str, _timeout: Duration) -> Result<()> {
            match self.behavior {
                Behavior::NavigationError => Err(LiftlineError::FetchFailed("net::ERR_CONNECTION_RESET".into())),
                _ => Ok(()),
            }
        }

        async fn evaluate(&self, expression: &str) -> Result<Value> {
            let polls = self.counters.polls.fetch_add(1, Ordering::SeqCst) + 1;
            match &self.behavior {
                Behavior::Feed(_, ready_after) if expression == FEED_READY => Ok(json!(polls >= *ready_after)),
                Behavior::Feed(feed, _) => Ok(feed.clone()),
                _ => Ok(json!(false)),
            }
        }

        async fn content(&self) -> Result<String> {
            Ok(String::new())
        }

        async fn close(&self) -> Result<()> {
            self.counters.pages_closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct MockSession {
        behavior: Behavior,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl BrowserSession for MockSession {
        fn is_connected(&self) -> bool {
            true
        }

        async fn new_page(&self) -> Result<Box<dyn BrowserPage>> {
            self.counters.pages_opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockPage {
                behavior: self.behavior.clone(),
                counters: Arc::clone(&self.counters),
            }) as Box<dyn BrowserPage>)
        }

        async fn closed(&self) {
            futures::future::pending::<()>().await
        }

        async fn close(&self) {}
    }

    struct MockLauncher {
        behavior: Behavior,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl BrowserLauncher for MockLauncher {
        async fn launch(&self) -> Result<Arc<dyn BrowserSession>> {
            Ok(Arc::new(MockSession {
                behavior: self.behavior.clone(),
                counters: Arc::clone(&self.counters),
            }) as Arc<dyn BrowserSession>)
        }
    }

    fn scraper(behavior: Behavior, ceiling: usize) -> (TerrainScraper, Arc<Counters>, ConcurrencyLimiter) {
        let counters = Arc::new(Counters::default());
        let launcher = Arc::new(MockLauncher {
            behavior,
            counters: Arc::clone(&counters),
        });
        let limiter = ConcurrencyLimiter::new(ceiling);
        let scraper = TerrainScraper::new(
            Arc::new(BrowserLifecycleManager::new(launcher)),
            limiter.clone(),
            TerrainScraperConfig::default(),
        );
        (scraper, counters, limiter)
    }

    #[tokio::test(start_paused = true)]
    async fn test_scrape_returns_feed_and_closes_page() {
        let feed = json!({"Lifts": [{"Name": "Eagle Bahn"}, {"Name": "Gondola One"}]});
        let (scraper, counters, limiter) = scraper(Behavior::Feed(feed.clone(), 3), 3);

        let result = scraper.scrape("Vail").await.unwrap().unwrap();
        assert_eq!(*result, feed);
        assert_eq!(counters.pages_opened.load(Ordering::SeqCst), 1);
        assert_eq!(counters.pages_closed.load(Ordering::SeqCst), 1);
        assert_eq!(limiter.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_null_feed_is_no_data() {
        let (scraper, counters, _) = scraper(Behavior::Feed(Value::Null, 1), 3);
        assert!(scraper.scrape("vail").await.unwrap().is_none());
        assert_eq!(counters.pages_closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_error_closes_page() {
        let (scraper, counters, limiter) = scraper(Behavior::NavigationError, 3);
        let err = scraper.scrape("stowe").await.unwrap_err();
        assert!(err.is_fetch_failure());
        assert_eq!(counters.pages_closed.load(Ordering::SeqCst), 1);
        assert_eq!(limiter.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_wait_times_out() {
        let (scraper, counters, _) = scraper(Behavior::NeverReady, 3);
        let started = tokio::time::Instant::now();
        let err = scraper.scrape("keystone").await.unwrap_err();
        assert!(matches!(err, LiftlineError::Timeout(_)));
        assert!(tokio::time::Instant::now() - started >= FEED_WAIT_TIMEOUT);
        assert_eq!(counters.pages_closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_resort() {
        let (scraper, counters, _) = scraper(Behavior::NeverReady, 3);
        let err = scraper.scrape("niseko").await.unwrap_err();
        assert_eq!(err, LiftlineError::UnknownResort("niseko".into()));
        assert_eq!(counters.pages_opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_when_ceiling_reached() {
        let (scraper, counters, limiter) = scraper(Behavior::NeverReady, 1);
        let _held = limiter.try_admit().unwrap();
        let err = scraper.scrape("vail").await.unwrap_err();
        assert!(matches!(err, LiftlineError::Unavailable(_)));
        assert_eq!(counters.pages_opened.load(Ordering::SeqCst), 0);
    }
}
