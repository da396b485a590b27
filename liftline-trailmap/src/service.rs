//! Resolve, download and prepare one resort's trail map.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use liftline_core::{DocumentRenderer, LiftlineError, Result, SourceKind, TrailMapPayload};

use crate::discovery::ResourceDiscoveryPipeline;
use crate::fetch::SourceDownloader;
use crate::profile::ProfileTable;
use crate::render::crop_top;

/// End-to-end trail-map fetch used as the cache's fetch function.
#[derive(Clone)]
pub struct TrailMapService {
    profiles: Arc<ProfileTable>,
    pipeline: ResourceDiscoveryPipeline,
    downloader: Arc<dyn SourceDownloader>,
    renderer: Arc<dyn DocumentRenderer>,
}

impl TrailMapService {
    /// Creates a service.
    pub fn new(
        profiles: ProfileTable,
        pipeline: ResourceDiscoveryPipeline,
        downloader: Arc<dyn SourceDownloader>,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> Self {
        Self {
            profiles: Arc::new(profiles),
            pipeline,
            downloader,
            renderer,
        }
    }

    /// The profile table in use.
    pub fn profiles(&self) -> &ProfileTable {
        &self.profiles
    }

    /// Returns true if `resort` has a profile.
    pub fn knows(&self, resort: &str) -> bool {
        self.profiles.get(resort).is_some()
    }

    /// Discovers, downloads, renders and crops the trail map for `resort`.
    ///
    /// `Ok(None)` when the validated source served an empty body.
    #[instrument(skip(self))]
    pub async fn fetch(&self, resort: &str) -> Result<Option<TrailMapPayload>> {
        let profile = self
            .profiles
            .get(resort)
            .ok_or_else(|| LiftlineError::NotFound(format!("no trail-map profile for '{}'", resort)))?;

        let source = self.pipeline.discover(resort, profile).await?;
        let downloaded = self.downloader.download(&source).await?;
        if downloaded.is_empty() {
            debug!(resort, url = %source.url, "Empty trail map body");
            return Ok(None);
        }

        let image = match source.kind {
            SourceKind::Image => downloaded,
            SourceKind::Document => {
                self.renderer
                    .render(downloaded.bytes, profile.pdf_page, profile.dpi)
                    .await?
            }
        };

        let image = match profile.crop_top_percent {
            Some(percent) => tokio::task::spawn_blocking(move || crop_top(&image, percent))
                .await
                .map_err(|e| LiftlineError::InternalError(format!("crop task: {}", e)))??,
            None => image,
        };

        info!(
            resort,
            strategy = %source.strategy,
            bytes = image.len(),
            content_type = %image.content_type,
            "Trail map ready"
        );
        Ok(Some(image))
    }
}
