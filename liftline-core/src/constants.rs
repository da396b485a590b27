//! Default tuning constants.
//!
//! These are the values the server uses when the environment does not
//! override them. Everything here is a default, never a hard limit.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// RESORT TERRAIN FEEDS
// ═══════════════════════════════════════════════════════════════════════════════

/// How long a scraped terrain feed is served without refetching.
pub const RESORT_CACHE_TTL: Duration = Duration::from_secs(90);

/// A resort not requested for this long is dropped from the cache.
pub const RESORT_STALE_DROP: Duration = Duration::from_secs(10 * 60);

/// How long a caller waits on somebody else's in-flight scrape.
pub const RESORT_WAIT_DEADLINE: Duration = Duration::from_secs(45);

// ═══════════════════════════════════════════════════════════════════════════════
// TRAIL MAPS
// ═══════════════════════════════════════════════════════════════════════════════

/// Trail-map images rarely change; keep them for six hours.
pub const TRAILMAP_CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Images are large, so they are dropped sooner than terrain feeds.
pub const TRAILMAP_STALE_DROP: Duration = Duration::from_secs(5 * 60);

/// Wait deadline for callers piggybacking on a trail-map resolution.
pub const TRAILMAP_WAIT_DEADLINE: Duration = Duration::from_secs(45);

/// Default page rendered from a trail-map PDF (1-based).
pub const DEFAULT_PDF_PAGE: u32 = 1;

/// Default render resolution for trail-map PDFs.
pub const DEFAULT_PDF_DPI: u32 = 150;

// ═══════════════════════════════════════════════════════════════════════════════
// ALTA
// ═══════════════════════════════════════════════════════════════════════════════

/// Freshness window for the Alta lift report.
pub const ALTA_CACHE_TTL: Duration = Duration::from_secs(90);

/// Alta is a plain document fetch, so waiters give up sooner.
pub const ALTA_WAIT_DEADLINE: Duration = Duration::from_secs(20);

/// Cache key of the Alta single-source cache.
pub const ALTA_CACHE_KEY: &str = "alta";

// ═══════════════════════════════════════════════════════════════════════════════
// FETCH ORCHESTRATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Interval between stale-eviction sweeps.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Ceiling on simultaneous browser-driven fetches.
pub const MAX_CONCURRENT_SCRAPES: usize = 3;

// ═══════════════════════════════════════════════════════════════════════════════
// BROWSER
// ═══════════════════════════════════════════════════════════════════════════════

/// Launch attempts are refused for this long after a failed launch.
pub const BROWSER_LAUNCH_COOLDOWN: Duration = Duration::from_secs(5);

/// How long a caller waits for another caller's launch to finish.
pub const BROWSER_LAUNCH_WAIT: Duration = Duration::from_secs(30);

/// Page navigation timeout.
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to wait for the terrain feed object to appear on the page.
pub const FEED_WAIT_TIMEOUT: Duration = Duration::from_secs(15);

/// Poll interval used while waiting for an in-page condition.
pub const PAGE_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ═══════════════════════════════════════════════════════════════════════════════
// HTTP
// ═══════════════════════════════════════════════════════════════════════════════

/// User agent sent when probing and downloading images.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

/// User agent sent when downloading documents. Some asset hosts serve a bot
/// challenge to anything that looks like a browser.
pub const DOCUMENT_USER_AGENT: &str = concat!("liftline/", env!("CARGO_PKG_VERSION"));

/// Default timeout for probes and downloads.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
