//! HTTP existence probe and asset download.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, RANGE, USER_AGENT};
use reqwest::{Response, StatusCode};
use tracing::{debug, instrument};

use liftline_core::{
    constants::{BROWSER_USER_AGENT, DOCUMENT_USER_AGENT, HTTP_TIMEOUT},
    content_type_for_url, DiscoveredSource, LiftlineError, Result, SourceKind, SourceProbe, TrailMapPayload,
};

/// Fetches the bytes behind a validated source.
#[async_trait]
pub trait SourceDownloader: Send + Sync {
    /// Downloads `source`. The payload's content type comes from the server,
    /// or from the URL when the server sends none.
    async fn download(&self, source: &DiscoveredSource) -> Result<TrailMapPayload>;
}

/// `reqwest`-backed probe and downloader.
///
/// Documents are requested with a plain, non-browser User-Agent: some hosts
/// answer browser-identified clients with a bot challenge page instead of
/// the PDF.
#[derive(Clone)]
pub struct HttpSourceClient {
    http_client: reqwest::Client,
}

impl HttpSourceClient {
    /// Creates a client with the default timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(HTTP_TIMEOUT)
    }

    /// Creates a client with an explicit timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LiftlineError::ConfigError(format!("HTTP client: {}", e)))?;
        Ok(Self { http_client })
    }

    fn user_agent(kind: SourceKind) -> &'static str {
        match kind {
            SourceKind::Image => BROWSER_USER_AGENT,
            SourceKind::Document => DOCUMENT_USER_AGENT,
        }
    }

    async fn head_or_range(&self, source: &DiscoveredSource) -> reqwest::Result<Response> {
        let ua = Self::user_agent(source.kind);
        let head = self
            .http_client
            .head(&source.url)
            .header(USER_AGENT, ua)
            .send()
            .await?;
        if !matches!(
            head.status(),
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::FORBIDDEN | StatusCode::NOT_IMPLEMENTED
        ) {
            return Ok(head);
        }
        // Some CDNs refuse HEAD; a one-byte ranged GET is nearly as cheap.
        debug!(url = %source.url, status = %head.status(), "HEAD refused, retrying with ranged GET");
        self.http_client
            .get(&source.url)
            .header(USER_AGENT, ua)
            .header(RANGE, "bytes=0-0")
            .send()
            .await
    }
}

fn header_content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl SourceProbe for HttpSourceClient {
    #[instrument(skip(self), fields(url = %source.url, kind = %source.kind))]
    async fn probe(&self, source: &DiscoveredSource) -> Result<()> {
        let response = self
            .head_or_range(source)
            .await
            .map_err(|e| LiftlineError::validation(&source.url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LiftlineError::validation(&source.url, format!("HTTP {}", status)));
        }
        if let Some(content_type) = header_content_type(&response) {
            if !source.kind.accepts_content_type(&content_type) {
                return Err(LiftlineError::validation(
                    &source.url,
                    format!("unexpected content type {}", content_type),
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SourceDownloader for HttpSourceClient {
    #[instrument(skip(self), fields(url = %source.url, kind = %source.kind))]
    async fn download(&self, source: &DiscoveredSource) -> Result<TrailMapPayload> {
        let response = self
            .http_client
            .get(&source.url)
            .header(USER_AGENT, Self::user_agent(source.kind))
            .send()
            .await
            .map_err(|e| LiftlineError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LiftlineError::FetchFailed(format!(
                "{} returned HTTP {}",
                source.url,
                response.status()
            )));
        }

        let content_type = header_content_type(&response)
            .filter(|ct| !ct.starts_with("application/octet-stream"))
            .unwrap_or_else(|| content_type_for_url(&source.url).to_string());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| LiftlineError::HttpError(e.to_string()))?;

        debug!(bytes = bytes.len(), content_type = %content_type, "Downloaded trail map source");
        Ok(TrailMapPayload::new(bytes, content_type))
    }
}
