//! Common traits for Liftline.
//!
//! These are the seams between the fetch engine and the outside world: the
//! headless browser, the validation probe, and the document renderer. Each has
//! a production implementation in its own crate and mocks in tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::constants::PAGE_POLL_INTERVAL;
use crate::error::{LiftlineError, Result};
use crate::types::{DiscoveredSource, TrailMapPayload};

// ═══════════════════════════════════════════════════════════════════════════════
// BROWSER TRAITS
// ═══════════════════════════════════════════════════════════════════════════════

/// One page (tab) opened on the shared browser session.
///
/// A page belongs to exactly one fetch, which must close it on every exit path.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigates to `url` and waits for the DOM content to load.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Evaluates a JavaScript expression and returns its JSON value.
    async fn evaluate(&self, expression: &str) -> Result<Value>;

    /// Returns the current page markup.
    async fn content(&self) -> Result<String>;

    /// Closes the page. Closing an already-dead page is not an error.
    async fn close(&self) -> Result<()>;

    /// Polls `expression` until it is truthy or `timeout` elapses.
    async fn wait_for_function(&self, expression: &str, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut last_error = None;
        loop {
            match self.evaluate(expression).await {
                Ok(value) if is_truthy(&value) => return Ok(()),
                Ok(_) => {}
                Err(e) => last_error = Some(e),
            }
            if tokio::time::Instant::now() >= deadline {
                let reason = last_error
                    .map(|e| format!(" (last error: {})", e))
                    .unwrap_or_default();
                return Err(LiftlineError::Timeout(format!(
                    "waiting for `{}` after {}ms{}",
                    expression,
                    timeout.as_millis(),
                    reason
                )));
            }
            tokio::time::sleep(PAGE_POLL_INTERVAL).await;
        }
    }
}

/// The shared browser process.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Returns true while the browser process is reachable.
    fn is_connected(&self) -> bool;

    /// Opens a fresh page.
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>>;

    /// Resolves once the session has disconnected.
    async fn closed(&self);

    /// Shuts the browser down.
    async fn close(&self);
}

/// Launches browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Starts a new browser process.
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISCOVERY TRAITS
// ═══════════════════════════════════════════════════════════════════════════════

/// Lightweight existence check for a discovery candidate.
#[async_trait]
pub trait SourceProbe: Send + Sync {
    /// Returns `Ok(())` if the candidate is servable, otherwise
    /// [`LiftlineError::ValidationFailed`].
    async fn probe(&self, source: &DiscoveredSource) -> Result<()>;
}

/// Turns a document into a raster image.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Renders `page` (1-based) of `document` at `dpi`.
    async fn render(&self, document: Bytes, page: u32, dpi: u32) -> Result<TrailMapPayload>;
}

/// JavaScript truthiness for a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
