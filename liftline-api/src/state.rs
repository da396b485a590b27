//! App state: caches, browser, fetchers, config.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use liftline_browser::{BrowserLifecycleManager, ChromeConfig, ChromeLauncher};
use liftline_cache::{CachePolicy, ConcurrencyLimiter, ResourceCache, StaleEvictionSweeper};
use liftline_core::{
    constants::*, AltaReport, BrowserLauncher, LiftlineError, ResortFeed, Result, TrailMapPayload,
};
use liftline_scraper::{AltaClient, AltaConfig, TerrainScraper, TerrainScraperConfig};
use liftline_trailmap::{
    BrowserPageLoader, HttpSourceClient, PopplerRenderer, ProfileTable, ResourceDiscoveryPipeline, TrailMapService,
};

const DEFAULT_PORT: u16 = 3000;

/// Server settings, read from the environment.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address
    pub bind: IpAddr,
    /// Listen port
    pub port: u16,
    /// Resort feed timings
    pub resort_policy: CachePolicy,
    /// Trail map timings
    pub trailmap_policy: CachePolicy,
    /// Alta report timings
    pub alta_policy: CachePolicy,
    /// Sweeper period
    pub cleanup_interval: Duration,
    /// Concurrent browser fetch ceiling
    pub max_concurrent_scrapes: usize,
    /// Refusal window after a failed browser launch
    pub browser_launch_cooldown: Duration,
    /// How long callers wait on someone else's launch
    pub browser_launch_wait: Duration,
    /// Page navigation limit
    pub navigation_timeout: Duration,
    /// Terrain feed wait limit
    pub feed_wait_timeout: Duration,
    /// Chrome binary
    pub chrome_path: Option<PathBuf>,
    /// `pdftoppm` binary
    pub pdftoppm_path: PathBuf,
    /// Alta lift status page
    pub alta_url: String,
    /// JSON file replacing the built-in trail-map profiles
    pub trailmap_profiles: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            resort_policy: CachePolicy::resort(),
            trailmap_policy: CachePolicy::trail_map(),
            alta_policy: CachePolicy::alta(),
            cleanup_interval: CLEANUP_INTERVAL,
            max_concurrent_scrapes: MAX_CONCURRENT_SCRAPES,
            browser_launch_cooldown: BROWSER_LAUNCH_COOLDOWN,
            browser_launch_wait: BROWSER_LAUNCH_WAIT,
            navigation_timeout: NAVIGATION_TIMEOUT,
            feed_wait_timeout: FEED_WAIT_TIMEOUT,
            chrome_path: None,
            pdftoppm_path: PathBuf::from("pdftoppm"),
            alta_url: liftline_scraper::DEFAULT_ALTA_URL.to_string(),
            trailmap_profiles: None,
        }
    }
}

impl ServerConfig {
    /// Reads the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from any variable source. Unset variables keep their
    /// defaults; unparseable ones are a `ConfigError`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let d = Self::default();
        let vars = Vars(&lookup);

        Ok(Self {
            bind: vars.parse("BIND", d.bind)?,
            port: vars.parse("PORT", d.port)?,
            resort_policy: CachePolicy::new(
                vars.millis("RESORT_CACHE_TTL_MS", d.resort_policy.ttl)?,
                vars.millis("RESORT_STALE_DROP_MS", d.resort_policy.idle_after)?,
                vars.millis("RESORT_WAIT_MS", d.resort_policy.wait_deadline)?,
            ),
            trailmap_policy: CachePolicy::new(
                vars.millis("TRAILMAP_CACHE_TTL_MS", d.trailmap_policy.ttl)?,
                vars.millis("TRAILMAP_STALE_DROP_MS", d.trailmap_policy.idle_after)?,
                vars.millis("TRAILMAP_WAIT_MS", d.trailmap_policy.wait_deadline)?,
            ),
            alta_policy: CachePolicy::new(
                vars.millis("ALTA_CACHE_TTL_MS", d.alta_policy.ttl)?,
                vars.millis("RESORT_STALE_DROP_MS", d.alta_policy.idle_after)?,
                vars.millis("ALTA_WAIT_MS", d.alta_policy.wait_deadline)?,
            ),
            cleanup_interval: vars.millis("CLEANUP_INTERVAL_MS", d.cleanup_interval)?,
            max_concurrent_scrapes: vars.parse("MAX_CONCURRENT_SCRAPES", d.max_concurrent_scrapes)?,
            browser_launch_cooldown: vars.millis("BROWSER_LAUNCH_COOLDOWN_MS", d.browser_launch_cooldown)?,
            browser_launch_wait: vars.millis("BROWSER_LAUNCH_WAIT_MS", d.browser_launch_wait)?,
            navigation_timeout: vars.millis("NAVIGATION_TIMEOUT_MS", d.navigation_timeout)?,
            feed_wait_timeout: vars.millis("FEED_WAIT_TIMEOUT_MS", d.feed_wait_timeout)?,
            chrome_path: vars.get("CHROME_PATH").map(PathBuf::from),
            pdftoppm_path: vars.get("PDFTOPPM_PATH").map(PathBuf::from).unwrap_or(d.pdftoppm_path),
            alta_url: vars.get("ALTA_URL").unwrap_or(d.alta_url),
            trailmap_profiles: vars.get("TRAILMAP_PROFILES").map(PathBuf::from),
        })
    }

    /// Listen socket.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

struct Vars<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, name: &str, default: T) -> Result<T> {
        match self.get(name) {
            Some(raw) => raw
                .parse()
                .map_err(|_| LiftlineError::ConfigError(format!("{}: cannot parse '{}'", name, raw))),
            None => Ok(default),
        }
    }

    fn millis(&self, name: &str, default: Duration) -> Result<Duration> {
        let ms = self.parse(name, default.as_millis() as u64)?;
        Ok(Duration::from_millis(ms))
    }
}

/// Everything a request handler needs, built once at startup.
pub struct AppState {
    /// Settings the state was built from
    pub config: ServerConfig,
    /// Terrain feeds by resort
    pub resorts: Arc<ResourceCache<ResortFeed>>,
    /// Prepared trail-map images by resort
    pub trailmaps: Arc<ResourceCache<TrailMapPayload>>,
    /// The single Alta report
    pub alta: Arc<ResourceCache<AltaReport>>,
    /// Ceiling shared by every browser fetch
    pub limiter: ConcurrencyLimiter,
    /// The shared browser
    pub browser: Arc<BrowserLifecycleManager>,
    /// Terrain feed fetcher
    pub scraper: TerrainScraper,
    /// Alta page fetcher
    pub alta_client: AltaClient,
    /// Trail-map fetcher
    pub trailmap_service: TrailMapService,
}

impl AppState {
    /// Builds the production state: headless Chrome, HTTP probes and
    /// `pdftoppm`.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let launcher = Arc::new(ChromeLauncher::new(ChromeConfig {
            chrome_path: config.chrome_path.clone(),
            ..Default::default()
        }));
        Self::with_launcher(config, launcher)
    }

    /// Builds state around any browser launcher.
    pub fn with_launcher(config: ServerConfig, launcher: Arc<dyn BrowserLauncher>) -> Result<Self> {
        let browser = Arc::new(BrowserLifecycleManager::with_timing(
            launcher,
            config.browser_launch_cooldown,
            config.browser_launch_wait,
        ));
        let limiter = ConcurrencyLimiter::new(config.max_concurrent_scrapes);

        let profiles = match &config.trailmap_profiles {
            Some(path) => ProfileTable::from_file(path)?,
            None => ProfileTable::builtin(),
        };
        let http = Arc::new(HttpSourceClient::new()?);
        let loader = BrowserPageLoader::new(Arc::clone(&browser), limiter.clone())
            .with_navigation_timeout(config.navigation_timeout);
        let pipeline = ResourceDiscoveryPipeline::new(http.clone(), Arc::new(loader));
        let trailmap_service = TrailMapService::new(
            profiles,
            pipeline,
            http,
            Arc::new(PopplerRenderer::new(config.pdftoppm_path.clone())),
        );

        Self::assemble(config, browser, limiter, trailmap_service)
    }

    /// Builds state from prepared parts.
    pub fn assemble(
        config: ServerConfig,
        browser: Arc<BrowserLifecycleManager>,
        limiter: ConcurrencyLimiter,
        trailmap_service: TrailMapService,
    ) -> Result<Self> {
        let scraper = TerrainScraper::new(
            Arc::clone(&browser),
            limiter.clone(),
            TerrainScraperConfig {
                navigation_timeout: config.navigation_timeout,
                feed_timeout: config.feed_wait_timeout,
            },
        );
        let alta_client = AltaClient::new(AltaConfig {
            url: config.alta_url.clone(),
            ..Default::default()
        })?;

        info!(
            trailmap_profiles = trailmap_service.profiles().len(),
            max_concurrent_scrapes = limiter.ceiling(),
            "App state ready"
        );

        Ok(Self {
            resorts: Arc::new(ResourceCache::new("resort", config.resort_policy)),
            trailmaps: Arc::new(ResourceCache::new("trailmap", config.trailmap_policy)),
            alta: Arc::new(ResourceCache::new("alta", config.alta_policy)),
            config,
            limiter,
            browser,
            scraper,
            alta_client,
            trailmap_service,
        })
    }

    /// Sweeper over every cache class.
    pub fn sweeper(&self) -> StaleEvictionSweeper {
        StaleEvictionSweeper::new(self.config.cleanup_interval)
            .register(self.resorts.clone())
            .register(self.trailmaps.clone())
            .register(self.alta.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.resort_policy, CachePolicy::resort());
        assert_eq!(config.trailmap_policy.ttl, Duration::from_secs(6 * 60 * 60));
        assert_eq!(config.alta_policy.wait_deadline, Duration::from_secs(20));
        assert_eq!(config.max_concurrent_scrapes, 3);
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
        assert!(config.chrome_path.is_none());
        assert_eq!(config.alta_url, "https://www.alta.com/lift-terrain-status");
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("BIND", "127.0.0.1"),
            ("RESORT_CACHE_TTL_MS", "1000"),
            ("MAX_CONCURRENT_SCRAPES", "5"),
            ("CHROME_PATH", "/usr/bin/chromium"),
            ("ALTA_URL", " "),
        ]))
        .unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.resort_policy.ttl, Duration::from_secs(1));
        assert_eq!(config.max_concurrent_scrapes, 5);
        assert_eq!(config.chrome_path, Some(PathBuf::from("/usr/bin/chromium")));
        assert_eq!(config.alta_url, liftline_scraper::DEFAULT_ALTA_URL);
    }

    #[test]
    fn test_bad_value() {
        let err = ServerConfig::from_lookup(lookup(&[("RESORT_WAIT_MS", "soon")])).unwrap_err();
        assert!(matches!(err, LiftlineError::ConfigError(_)));
    }
}
