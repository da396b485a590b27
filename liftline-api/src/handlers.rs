//! API route handlers.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::debug;

use liftline_core::{constants::ALTA_CACHE_KEY, lift_count, normalize_key, AltaReport, LiftlineError};
use liftline_scraper::{resort_keys, terrain_url};

use crate::dto::*;
use crate::error::ApiError;
use crate::state::AppState;

type Result<T> = std::result::Result<T, ApiError>;

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Starts the uptime clock.
pub(crate) fn mark_started() {
    START_TIME.get_or_init(Instant::now);
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let uptime = START_TIME.get_or_init(Instant::now).elapsed().as_secs();

    // Keys that were requested but never produced a value still show up,
    // with no fetch time and zero counts.
    let cached: BTreeMap<String, CachedFeedInfo> = state
        .resorts
        .entries()
        .into_iter()
        .map(|entry| {
            let info = CachedFeedInfo {
                last_fetch: entry.fetched_at_utc,
                lifts: entry.value.as_ref().map_or(0, |feed| lift_count(feed)),
            };
            (entry.key, info)
        })
        .collect();

    let trailmaps: BTreeMap<String, TrailMapInfo> = state
        .trailmaps
        .entries()
        .into_iter()
        .map(|entry| {
            let info = TrailMapInfo {
                last_fetch: entry.fetched_at_utc,
                bytes: entry.value.as_ref().map_or(0, |payload| payload.len()),
                content_type: entry.value.map(|payload| payload.content_type),
            };
            (entry.key, info)
        })
        .collect();

    let alta = state.alta.store().get(ALTA_CACHE_KEY).map(|entry| AltaInfo {
        last_fetch: entry.fetched_at_utc,
        lifts: entry.value.as_ref().map_or(0, |report| report.lifts.len()),
        open: entry.value.as_ref().map_or(0, |report| report.open_count()),
    });

    let in_flight = state.resorts.stats().in_flight + state.trailmaps.stats().in_flight + state.alta.stats().in_flight;

    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_seconds: uptime,
        cached,
        trailmaps,
        alta,
        browser: state.browser.status(),
        active_scrapes: state.limiter.active(),
        in_flight,
    })
}

/// GET /resorts
pub async fn list_resorts() -> Json<Vec<&'static str>> {
    Json(resort_keys())
}

/// GET /:resort
///
/// Serves the cached terrain feed, scraping it first when stale.
pub async fn resort_status(State(state): State<Arc<AppState>>, Path(resort): Path<String>) -> Result<Json<Value>> {
    let key = normalize_key(&resort);
    if terrain_url(&key).is_none() {
        return Err(ApiError::unknown_resort());
    }

    let scraper = state.scraper.clone();
    let fetch_key = key.clone();
    let feed = state
        .resorts
        .get_or_fetch(&key, move || async move { scraper.scrape(&fetch_key).await })
        .await
        .map_err(|e| ApiError::no_data(&e))?;

    debug!(resort = %key, lifts = lift_count(&feed), "Serving terrain feed");
    Ok(Json(Value::clone(&feed)))
}

/// GET /trailmap/:resort
///
/// Serves the cached trail-map image, resolving it first when stale.
pub async fn trail_map(State(state): State<Arc<AppState>>, Path(resort): Path<String>) -> Result<Response> {
    let key = normalize_key(&resort);
    if !state.trailmap_service.knows(&key) {
        return Err(ApiError::from(LiftlineError::NotFound(key)));
    }

    let service = state.trailmap_service.clone();
    let fetch_key = key.clone();
    let payload = state
        .trailmaps
        .get_or_fetch(&key, move || async move { service.fetch(&fetch_key).await })
        .await?;

    debug!(resort = %key, bytes = payload.len(), "Serving trail map");
    Ok(([(header::CONTENT_TYPE, payload.content_type)], payload.bytes).into_response())
}

/// GET /alta
pub async fn alta_status(State(state): State<Arc<AppState>>) -> Result<Json<AltaReport>> {
    let client = state.alta_client.clone();
    let report = state
        .alta
        .get_or_fetch(ALTA_CACHE_KEY, move || async move { client.fetch_report().await })
        .await
        .map_err(|e| ApiError::no_data(&e))?;
    Ok(Json(report))
}
