//! Trail-map source discovery.
//!
//! Strategies run in a fixed order and the first candidate that passes the
//! probe wins. A URL is probed at most once per pass, and the map page is
//! loaded at most once and shared by the live-page and document strategies.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use liftline_core::{DiscoveredSource, LiftlineError, Result, SourceKind, SourceProbe};

use crate::page::{PageLoader, PageSnapshot};
use crate::profile::TrailMapProfile;

/// Strategy name for profile-level static images.
pub const STRATEGY_DIRECT: &str = "direct";
/// Strategy name for the profile's override URL.
pub const STRATEGY_OVERRIDE: &str = "override";
/// Strategy name for images read from the rendered map page.
pub const STRATEGY_LIVE_PAGE: &str = "live-page";
/// Strategy name for PDF links (and their image siblings) on the map page.
pub const STRATEGY_DOCUMENT: &str = "document";

fn trail_map_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)trail[\s_-]*map").expect("valid regex"))
}

fn seasonal_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)summer|bike").expect("valid regex"))
}

fn resize_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-\d{2,5}x\d{2,5}(\.[A-Za-z0-9]+)$").expect("valid regex"))
}

fn pdf_link() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)["']([^"'\s<>]+?\.pdf)(?:[?#][^"'\s<>]*)?["']"#).expect("valid regex"))
}

/// Returns true if `text` names a winter trail map.
pub fn looks_like_trail_map(text: &str) -> bool {
    trail_map_name().is_match(text) && !seasonal_name().is_match(text)
}

/// Resolves `src` against `base` and strips the query, fragment and any
/// `-WxH` resize suffix so the full-resolution asset is requested.
pub fn canonical_asset_url(base: &Url, src: &str) -> Option<String> {
    let mut url = base.join(src.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_query(None);
    url.set_fragment(None);
    let path = resize_suffix().replace(url.path(), "$1").into_owned();
    url.set_path(&path);
    Some(url.to_string())
}

/// Largest entry of a `srcset` attribute, by width or density descriptor.
///
/// Entries are split the way browsers do it: a URL runs to the next
/// whitespace, so commas inside it (`/w_800,h_450/map.jpg`) are kept, and
/// only the comma after the descriptor ends the entry.
fn largest_srcset_entry(srcset: &str) -> Option<&str> {
    let mut best: Option<(&str, f64)> = None;
    let mut rest = srcset;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }
        let url_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let (raw_url, after) = rest.split_at(url_end);

        // A trailing comma on the URL means the entry has no descriptor.
        let (url, size) = if raw_url.ends_with(',') {
            rest = after;
            (raw_url.trim_end_matches(','), 1.0)
        } else {
            let desc_end = after.find(',').unwrap_or(after.len());
            let size = after[..desc_end]
                .split_whitespace()
                .next()
                .and_then(|d| d.trim_end_matches(['w', 'x']).parse::<f64>().ok())
                .unwrap_or(1.0);
            rest = &after[desc_end..];
            (raw_url, size)
        };

        if best.map_or(true, |(_, top)| size > top) {
            best = Some((url, size));
        }
    }
    best.map(|(url, _)| url)
}

/// Image URLs on the page that look like a trail map, in document order.
pub fn image_candidates(snapshot: &PageSnapshot) -> Vec<String> {
    let Ok(base) = Url::parse(&snapshot.url) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    snapshot
        .images
        .iter()
        .filter(|img| {
            let text = format!(
                "{} {} {}",
                img.src,
                img.alt.as_deref().unwrap_or_default(),
                img.srcset.as_deref().unwrap_or_default()
            );
            looks_like_trail_map(&text)
        })
        .filter_map(|img| {
            let src = img
                .srcset
                .as_deref()
                .and_then(largest_srcset_entry)
                .unwrap_or(&img.src);
            canonical_asset_url(&base, src)
        })
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Trail-map PDFs linked from the page markup, in document order.
pub fn document_candidates(snapshot: &PageSnapshot) -> Vec<String> {
    let Ok(base) = Url::parse(&snapshot.url) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    pdf_link()
        .captures_iter(&snapshot.html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|link| {
            let file_name = link.rsplit('/').next().unwrap_or(link);
            looks_like_trail_map(file_name)
        })
        .filter_map(|link| canonical_asset_url(&base, link))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// `…/map.pdf` → `…/map.<ext>`.
fn image_sibling(pdf_url: &str, ext: &str) -> String {
    let stem = &pdf_url[..pdf_url.len() - ".pdf".len()];
    format!("{}.{}", stem, ext.trim_start_matches('.'))
}

/// Bookkeeping for one resolution pass.
struct Pass<'a> {
    resort: &'a str,
    probe: &'a dyn SourceProbe,
    tried: HashSet<String>,
    first_error: Option<LiftlineError>,
}

impl<'a> Pass<'a> {
    async fn try_candidate(&mut self, candidate: DiscoveredSource) -> Option<DiscoveredSource> {
        if !self.tried.insert(candidate.url.clone()) {
            return None;
        }
        match self.probe.probe(&candidate).await {
            Ok(()) => {
                info!(
                    resort = self.resort,
                    strategy = %candidate.strategy,
                    url = %candidate.url,
                    kind = %candidate.kind,
                    "Trail map found"
                );
                Some(candidate.validated())
            }
            Err(e) => {
                debug!(
                    resort = self.resort,
                    strategy = %candidate.strategy,
                    url = %candidate.url,
                    error = %e,
                    "Candidate rejected"
                );
                None
            }
        }
    }

    fn record(&mut self, error: LiftlineError) {
        self.first_error.get_or_insert(error);
    }

    fn finish(self) -> LiftlineError {
        self.first_error
            .unwrap_or_else(|| LiftlineError::NotFound(format!("no trail map found for '{}'", self.resort)))
    }
}

/// Runs the strategy chain for one resort.
#[derive(Clone)]
pub struct ResourceDiscoveryPipeline {
    probe: Arc<dyn SourceProbe>,
    loader: Arc<dyn PageLoader>,
}

impl ResourceDiscoveryPipeline {
    /// Creates a pipeline.
    pub fn new(probe: Arc<dyn SourceProbe>, loader: Arc<dyn PageLoader>) -> Self {
        Self { probe, loader }
    }

    /// Finds a validated trail-map source.
    ///
    /// Fails with `NotFound` when no candidate validates, or with the first
    /// strategy error (browser unavailable, page load failure) when one
    /// occurred and nothing validated.
    #[instrument(skip(self, profile))]
    pub async fn discover(&self, resort: &str, profile: &TrailMapProfile) -> Result<DiscoveredSource> {
        if let Some(url) = &profile.direct_url {
            return Ok(DiscoveredSource::candidate(url, STRATEGY_DIRECT).validated());
        }

        let mut pass = Pass {
            resort,
            probe: self.probe.as_ref(),
            tried: HashSet::new(),
            first_error: None,
        };

        if let Some(url) = &profile.override_url {
            if let Some(found) = pass
                .try_candidate(DiscoveredSource::candidate(url, STRATEGY_OVERRIDE))
                .await
            {
                return Ok(found);
            }
        }

        if let Some(page_url) = &profile.map_page_url {
            match self.loader.load(page_url).await {
                Ok(snapshot) => {
                    if let Some(found) = self.scan_page(&mut pass, &snapshot, profile).await {
                        return Ok(found);
                    }
                }
                Err(e) => {
                    warn!(resort, url = %page_url, error = %e, "Map page unavailable");
                    pass.record(e);
                }
            }
        }

        Err(pass.finish())
    }

    async fn scan_page(
        &self,
        pass: &mut Pass<'_>,
        snapshot: &PageSnapshot,
        profile: &TrailMapProfile,
    ) -> Option<DiscoveredSource> {
        let images = image_candidates(snapshot);
        debug!(resort = pass.resort, candidates = images.len(), "Scanning page images");
        for url in images {
            let candidate = DiscoveredSource::with_kind(url, SourceKind::Image, STRATEGY_LIVE_PAGE);
            if let Some(found) = pass.try_candidate(candidate).await {
                return Some(found);
            }
        }

        for pdf in document_candidates(snapshot) {
            if let Some(ext) = &profile.image_sibling_ext {
                let sibling = DiscoveredSource::with_kind(image_sibling(&pdf, ext), SourceKind::Image, STRATEGY_DOCUMENT);
                if let Some(found) = pass.try_candidate(sibling).await {
                    return Some(found);
                }
            }
            let document = DiscoveredSource::with_kind(pdf, SourceKind::Document, STRATEGY_DOCUMENT);
            if let Some(found) = pass.try_candidate(document).await {
                return Some(found);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use std::sync::Mutex;
    use test_case::test_case;

    use crate::page::PageImage;

    /// Accepts only the listed URLs and records every probe.
    struct AllowListProbe {
        allowed: Vec<String>,
        probed: Mutex<Vec<String>>,
    }

    impl AllowListProbe {
        fn allowing(urls: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                allowed: urls.iter().map(|u| u.to_string()).collect(),
                probed: Mutex::new(Vec::new()),
            })
        }

        fn all(&self) -> Vec<String> {
            self.probed.lock().unwrap().clone()
        }

        fn count(&self, url: &str) -> usize {
            self.probed.lock().unwrap().iter().filter(|u| *u == url).count()
        }
    }

    #[async_trait]
    impl SourceProbe for AllowListProbe {
        async fn probe(&self, source: &DiscoveredSource) -> Result<()> {
            self.probed.lock().unwrap().push(source.url.clone());
            if self.allowed.contains(&source.url) {
                Ok(())
            } else {
                Err(LiftlineError::validation(&source.url, "HTTP 404"))
            }
        }
    }

    struct FixedLoader {
        page: Result<PageSnapshot>,
        loads: AtomicUsize,
    }

    impl FixedLoader {
        fn new(page: Result<PageSnapshot>) -> Arc<Self> {
            Arc::new(Self {
                page,
                loads: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PageLoader for FixedLoader {
        async fn load(&self, _url: &str) -> Result<PageSnapshot> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.page.clone()
        }
    }

    const PAGE_URL: &str = "https://www.resort.test/the-mountain/trail-map.aspx";

    fn snapshot() -> PageSnapshot {
        PageSnapshot {
            url: PAGE_URL.into(),
            images: vec![
                PageImage {
                    src: "/-/media/summer-trail-map.jpg".into(),
                    ..Default::default()
                },
                PageImage {
                    src: "/-/media/logo.svg".into(),
                    alt: Some("Resort".into()),
                    ..Default::default()
                },
                PageImage {
                    src: "/-/media/winter-map-1024x768.jpg?v=3".into(),
                    alt: Some("Winter Trail Map".into()),
                    ..Default::default()
                },
            ],
            html: r#"<a href="/docs/Bike-Park-Trail-Map.pdf">bike</a>
                     <a href='/docs/2026-trail-map.pdf?dl=1'>winter</a>"#
                .into(),
        }
    }

    fn profile(override_url: Option<&str>) -> TrailMapProfile {
        TrailMapProfile {
            override_url: override_url.map(str::to_string),
            ..TrailMapProfile::scanning(PAGE_URL)
        }
    }

    #[test_case("Winter Trail Map", true)]
    #[test_case("trail_map_2026.jpg", true)]
    #[test_case("TRAIL-MAP", true)]
    #[test_case("Summer Trail Map", false)]
    #[test_case("bike-trail-map.pdf", false)]
    #[test_case("resort-logo.png", false)]
    fn test_looks_like_trail_map(text: &str, expected: bool) {
        assert_eq!(looks_like_trail_map(text), expected);
    }

    #[test_case("/media/map-1920x1080.jpg?w=400", "https://www.resort.test/media/map.jpg" ; "resize suffix and query")]
    #[test_case("https://cdn.test/map.png#top", "https://cdn.test/map.png" ; "absolute with fragment")]
    #[test_case("media/trail-map.webp", "https://www.resort.test/the-mountain/media/trail-map.webp" ; "relative path")]
    fn test_canonical_asset_url(src: &str, expected: &str) {
        let base = Url::parse(PAGE_URL).unwrap();
        assert_eq!(canonical_asset_url(&base, src).unwrap(), expected);
    }

    #[test]
    fn test_canonical_rejects_non_http() {
        let base = Url::parse(PAGE_URL).unwrap();
        assert!(canonical_asset_url(&base, "data:image/png;base64,AAAA").is_none());
    }

    #[test]
    fn test_srcset_prefers_largest() {
        assert_eq!(
            largest_srcset_entry("/a-480w.jpg 480w, /a-1600w.jpg 1600w, /a-960w.jpg 960w"),
            Some("/a-1600w.jpg")
        );
        assert_eq!(largest_srcset_entry("/a.jpg, /a@2x.jpg 2x"), Some("/a@2x.jpg"));
        assert_eq!(largest_srcset_entry(""), None);
        assert_eq!(largest_srcset_entry(" , "), None);
    }

    #[test]
    fn test_srcset_keeps_commas_inside_urls() {
        assert_eq!(
            largest_srcset_entry(
                "https://cdn.test/w_800,h_450/trail-map.jpg 800w, https://cdn.test/w_1600,h_900/trail-map.jpg 1600w"
            ),
            Some("https://cdn.test/w_1600,h_900/trail-map.jpg")
        );
        // Descriptor glued to the next entry's comma.
        assert_eq!(
            largest_srcset_entry("/c_fit,w_480/map.jpg 480w,/c_fit,w_960/map.jpg 960w"),
            Some("/c_fit,w_960/map.jpg")
        );
        // No descriptors at all.
        assert_eq!(largest_srcset_entry("/map.jpg,"), Some("/map.jpg"));
    }

    #[test]
    fn test_candidates_from_snapshot() {
        let snapshot = snapshot();
        assert_eq!(
            image_candidates(&snapshot),
            vec!["https://www.resort.test/-/media/winter-map.jpg".to_string()]
        );
        assert_eq!(
            document_candidates(&snapshot),
            vec!["https://www.resort.test/docs/2026-trail-map.pdf".to_string()]
        );
    }

    #[tokio::test]
    async fn test_override_fails_then_live_page_wins() {
        let override_url = "https://www.resort.test/old/trail-map.jpg";
        let live_url = "https://www.resort.test/-/media/winter-map.jpg";
        let probe = AllowListProbe::allowing(&[live_url]);
        let loader = FixedLoader::new(Ok(snapshot()));
        let pipeline = ResourceDiscoveryPipeline::new(probe.clone(), loader.clone());

        let found = pipeline.discover("vail", &profile(Some(override_url))).await.unwrap();

        assert_eq!(found.url, live_url);
        assert_eq!(found.strategy, STRATEGY_LIVE_PAGE);
        assert_eq!(found.kind, SourceKind::Image);
        assert!(found.validated);
        assert_eq!(probe.count(override_url), 1);
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_override_wins_without_loading_page() {
        let override_url = "https://www.resort.test/trail-map.jpg";
        let probe = AllowListProbe::allowing(&[override_url]);
        let loader = FixedLoader::new(Ok(snapshot()));
        let pipeline = ResourceDiscoveryPipeline::new(probe, loader.clone());

        let found = pipeline.discover("vail", &profile(Some(override_url))).await.unwrap();
        assert_eq!(found.strategy, STRATEGY_OVERRIDE);
        assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_direct_url_skips_chain() {
        let probe = AllowListProbe::allowing(&[]);
        let loader = FixedLoader::new(Ok(snapshot()));
        let pipeline = ResourceDiscoveryPipeline::new(probe.clone(), loader.clone());

        let found = pipeline
            .discover("alta", &TrailMapProfile::direct("https://alta.test/map.jpg"))
            .await
            .unwrap();
        assert_eq!(found.strategy, STRATEGY_DIRECT);
        assert!(found.validated);
        assert!(probe.all().is_empty());
        assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_document_fallback() {
        let pdf = "https://www.resort.test/docs/2026-trail-map.pdf";
        let probe = AllowListProbe::allowing(&[pdf]);
        let pipeline = ResourceDiscoveryPipeline::new(probe.clone(), FixedLoader::new(Ok(snapshot())));

        let found = pipeline.discover("keystone", &profile(None)).await.unwrap();
        assert_eq!(found.url, pdf);
        assert_eq!(found.kind, SourceKind::Document);
        assert_eq!(found.strategy, STRATEGY_DOCUMENT);
        assert_eq!(
            probe.all(),
            vec!["https://www.resort.test/-/media/winter-map.jpg".to_string(), pdf.to_string()]
        );
    }

    #[tokio::test]
    async fn test_image_sibling_preferred_over_pdf() {
        let sibling = "https://www.resort.test/docs/2026-trail-map.jpg";
        let probe = AllowListProbe::allowing(&[sibling, "https://www.resort.test/docs/2026-trail-map.pdf"]);
        let pipeline = ResourceDiscoveryPipeline::new(probe, FixedLoader::new(Ok(snapshot())));

        let mut profile = profile(None);
        profile.image_sibling_ext = Some("jpg".into());
        let found = pipeline.discover("whistlerblackcomb", &profile).await.unwrap();
        assert_eq!(found.url, sibling);
        assert_eq!(found.kind, SourceKind::Image);
    }

    #[tokio::test]
    async fn test_nothing_validates() {
        let pipeline = ResourceDiscoveryPipeline::new(AllowListProbe::allowing(&[]), FixedLoader::new(Ok(snapshot())));
        let err = pipeline.discover("stowe", &profile(None)).await.unwrap_err();
        assert!(matches!(err, LiftlineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_page_error_surfaces_over_not_found() {
        let probe = AllowListProbe::allowing(&[]);
        let loader = FixedLoader::new(Err(LiftlineError::BrowserUnavailable("launch on cooldown".into())));
        let pipeline = ResourceDiscoveryPipeline::new(probe, loader);

        let err = pipeline
            .discover("vail", &profile(Some("https://www.resort.test/old/trail-map.jpg")))
            .await
            .unwrap_err();
        assert!(matches!(err, LiftlineError::BrowserUnavailable(_)));
    }

    #[tokio::test]
    async fn test_candidate_probed_once_per_pass() {
        let live_url = "https://www.resort.test/-/media/winter-map.jpg";
        let probe = AllowListProbe::allowing(&[]);
        let pipeline = ResourceDiscoveryPipeline::new(probe.clone(), FixedLoader::new(Ok(snapshot())));

        let _ = pipeline.discover("vail", &profile(Some(live_url))).await;
        assert_eq!(probe.count(live_url), 1);
    }
}
