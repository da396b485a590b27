//! Response bodies.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use liftline_browser::BrowserStatus;

/// Error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Generic message
    pub error: String,
}

/// One cached terrain feed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedFeedInfo {
    /// When the feed was fetched
    pub last_fetch: Option<DateTime<Utc>>,
    /// Lifts in the feed
    pub lifts: usize,
}

/// One cached trail map.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrailMapInfo {
    /// When the image was fetched
    pub last_fetch: Option<DateTime<Utc>>,
    /// Image size
    pub bytes: usize,
    /// Image MIME type, absent until an image arrives
    pub content_type: Option<String>,
}

/// The cached Alta report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AltaInfo {
    /// When the report was fetched
    pub last_fetch: Option<DateTime<Utc>>,
    /// Lifts in the report
    pub lifts: usize,
    /// Lifts currently open
    pub open: usize,
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always true when the server answers
    pub ok: bool,
    /// Version
    pub version: String,
    /// Uptime in seconds
    pub uptime_seconds: u64,
    /// Requested resort feeds, fetched or not
    pub cached: BTreeMap<String, CachedFeedInfo>,
    /// Requested trail maps, fetched or not
    pub trailmaps: BTreeMap<String, TrailMapInfo>,
    /// Alta report, once requested
    pub alta: Option<AltaInfo>,
    /// Shared browser state
    pub browser: BrowserStatus,
    /// Browser fetches holding a limiter slot
    pub active_scrapes: usize,
    /// Fetches running across every cache
    pub in_flight: usize,
}
