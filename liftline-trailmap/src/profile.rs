//! Per-resort trail-map rules.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use liftline_core::{
    constants::{DEFAULT_PDF_DPI, DEFAULT_PDF_PAGE},
    normalize_key, LiftlineError, Result,
};
use liftline_scraper::resorts::TERRAIN_URLS;

const VAIL_MAP_PATH: &str = "/the-mountain/about-the-mountain/trail-map.aspx";
const CRESTED_BUTTE_MAP: &str = "https://www.skicb.com/-/media/crested-butte/trail-maps/crested-butte-trail-map.jpg";

/// How to find and prepare one resort's trail map.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailMapProfile {
    /// Static image URL served without discovery
    pub direct_url: Option<String>,
    /// Known asset tried before scanning the map page
    pub override_url: Option<String>,
    /// Page scanned for map images and PDF links
    pub map_page_url: Option<String>,
    /// 1-based PDF page to render
    pub pdf_page: u32,
    /// Render resolution for PDFs
    pub dpi: u32,
    /// Keep only the top N% of the image
    pub crop_top_percent: Option<u8>,
    /// Extension of an image published next to the PDF (`map.pdf` → `map.jpg`)
    pub image_sibling_ext: Option<String>,
}

impl Default for TrailMapProfile {
    fn default() -> Self {
        Self {
            direct_url: None,
            override_url: None,
            map_page_url: None,
            pdf_page: DEFAULT_PDF_PAGE,
            dpi: DEFAULT_PDF_DPI,
            crop_top_percent: None,
            image_sibling_ext: None,
        }
    }
}

impl TrailMapProfile {
    /// Profile that scans `page`.
    pub fn scanning(page: impl Into<String>) -> Self {
        Self {
            map_page_url: Some(page.into()),
            ..Default::default()
        }
    }

    /// Profile with a static image.
    pub fn direct(url: impl Into<String>) -> Self {
        Self {
            direct_url: Some(url.into()),
            ..Default::default()
        }
    }

    fn validate(&self, key: &str) -> Result<()> {
        if self.direct_url.is_none() && self.override_url.is_none() && self.map_page_url.is_none() {
            return Err(LiftlineError::ConfigError(format!("profile '{}' has no source", key)));
        }
        if self.pdf_page == 0 || self.dpi == 0 {
            return Err(LiftlineError::ConfigError(format!(
                "profile '{}': pdf_page and dpi must be positive",
                key
            )));
        }
        if let Some(pct) = self.crop_top_percent {
            if pct == 0 || pct > 100 {
                return Err(LiftlineError::ConfigError(format!(
                    "profile '{}': crop_top_percent must be 1-100, got {}",
                    key, pct
                )));
            }
        }
        Ok(())
    }
}

/// Profiles keyed by resort.
#[derive(Clone, Debug, Default)]
pub struct ProfileTable {
    profiles: HashMap<String, TrailMapProfile>,
}

impl ProfileTable {
    /// The built-in table: every terrain-status resort's map page plus the
    /// two resorts served from static images.
    pub fn builtin() -> Self {
        let mut table = Self::default();
        for (key, terrain_url) in TERRAIN_URLS {
            if let Some(origin) = origin_of(terrain_url) {
                table.insert(key, TrailMapProfile::scanning(format!("{}{}", origin, VAIL_MAP_PATH)));
            }
        }

        // Brochure text along the bottom of the published map.
        if let Some(stowe) = table.profiles.get_mut("stowe") {
            stowe.crop_top_percent = Some(88);
        }
        // The map page lazy-loads its image; the published asset is tried
        // first and the page scan stays as the fallback.
        if let Some(cb) = table.profiles.get_mut("crestedbutte") {
            cb.override_url = Some(CRESTED_BUTTE_MAP.into());
        }
        // Ships the map as a PDF with a same-named JPEG beside it.
        if let Some(whistler) = table.profiles.get_mut("whistlerblackcomb") {
            whistler.image_sibling_ext = Some("jpg".into());
        }

        table.insert(
            "alta",
            TrailMapProfile::direct("https://www.alta.com/uploads/trail-maps/alta-winter-trail-map.jpg"),
        );
        table.insert(
            "snowbird",
            TrailMapProfile::direct("https://www.snowbird.com/uploads/trail-maps/snowbird-winter-trail-map.jpg"),
        );
        table
    }

    /// Parses a JSON object of `{ resort: profile }`.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, TrailMapProfile> = serde_json::from_str(json)?;
        let mut table = Self::default();
        for (key, profile) in raw {
            profile.validate(&key)?;
            table.insert(&key, profile);
        }
        Ok(table)
    }

    /// Loads a table from a JSON file, replacing the built-in one.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| LiftlineError::ConfigError(format!("reading {}: {}", path.display(), e)))?;
        let table = Self::from_json(&json)?;
        info!(path = %path.display(), profiles = table.len(), "Loaded trail-map profiles");
        Ok(table)
    }

    /// Adds or replaces a profile.
    pub fn insert(&mut self, key: &str, profile: TrailMapProfile) {
        self.profiles.insert(normalize_key(key), profile);
    }

    /// Profile for `key`.
    pub fn get(&self, key: &str) -> Option<&TrailMapProfile> {
        self.profiles.get(&normalize_key(key))
    }

    /// Sorted resort keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.profiles.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of profiles.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn origin_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    Some(parsed.origin().ascii_serialization())
}
