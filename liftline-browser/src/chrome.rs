//! Headless Chrome backend.
//!
//! `headless_chrome` is synchronous, so every call into it runs on the
//! blocking pool. A watchdog pings the browser and flips the session to
//! disconnected as soon as the process stops answering.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use liftline_core::{
    constants::BROWSER_USER_AGENT, BrowserLauncher, BrowserPage, BrowserSession, LiftlineError, Result,
};

const CHROME_ARGS: &[&str] = &[
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--no-first-run",
    "--mute-audio",
];

/// Chrome launch settings.
#[derive(Clone, Debug)]
pub struct ChromeConfig {
    /// Chrome binary; auto-detected when `None`
    pub chrome_path: Option<PathBuf>,
    /// User-Agent presented by every page
    pub user_agent: String,
    /// How often the watchdog checks the browser is alive
    pub ping_interval: Duration,
}

impl Default for ChromeConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            user_agent: BROWSER_USER_AGENT.to_string(),
            ping_interval: Duration::from_secs(10),
        }
    }
}

/// Launches headless Chrome processes.
#[derive(Clone, Debug, Default)]
pub struct ChromeLauncher {
    config: Arc<ChromeConfig>,
}

impl ChromeLauncher {
    /// Creates a launcher.
    pub fn new(config: ChromeConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    #[instrument(skip(self))]
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>> {
        let path = self.config.chrome_path.clone();
        let browser = run_blocking(move || {
            let args: Vec<&OsStr> = CHROME_ARGS.iter().map(OsStr::new).collect();
            let options = LaunchOptions::default_builder()
                .headless(true)
                .sandbox(false)
                .path(path)
                .args(args)
                // The transport drops an idle connection after this long.
                .idle_browser_timeout(Duration::from_secs(60 * 60 * 24 * 365))
                .build()
                .map_err(|e| anyhow::anyhow!("invalid launch options: {}", e))?;
            Browser::new(options)
        })
        .await
        .map_err(|e| LiftlineError::BrowserUnavailable(e.to_string()))?;

        info!("Chrome started");
        let session: Arc<dyn BrowserSession> = ChromeSession::start(browser, Arc::clone(&self.config));
        Ok(session)
    }
}

/// A running Chrome process.
pub struct ChromeSession {
    browser: Mutex<Option<Browser>>,
    connected: Arc<AtomicBool>,
    closed: watch::Sender<bool>,
    watchdog: Mutex<Option<JoinHandle<()>>>,
    config: Arc<ChromeConfig>,
}

impl ChromeSession {
    fn start(browser: Browser, config: Arc<ChromeConfig>) -> Arc<Self> {
        let (closed, _) = watch::channel(false);
        let session = Arc::new(Self {
            browser: Mutex::new(Some(browser)),
            connected: Arc::new(AtomicBool::new(true)),
            closed,
            watchdog: Mutex::new(None),
            config,
        });
        let handle = tokio::spawn(watchdog(Arc::downgrade(&session)));
        *session.watchdog.lock() = Some(handle);
        session
    }

    fn browser(&self) -> Result<Browser> {
        self.browser
            .lock()
            .clone()
            .ok_or_else(|| LiftlineError::BrowserUnavailable("browser closed".into()))
    }

    fn mark_disconnected(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            warn!("Chrome stopped responding");
        }
        self.closed.send_replace(true);
    }

    async fn ping(&self) -> bool {
        let Ok(browser) = self.browser() else {
            return false;
        };
        run_blocking(move || browser.get_version().map(|_| ()))
            .await
            .is_ok()
    }
}

async fn watchdog(session: std::sync::Weak<ChromeSession>) {
    loop {
        let interval = match session.upgrade() {
            Some(s) if s.is_connected() => s.config.ping_interval,
            _ => return,
        };
        tokio::time::sleep(interval).await;
        let Some(session) = session.upgrade() else {
            return;
        };
        if !session.ping().await {
            session.mark_disconnected();
            return;
        }
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn new_page(&self) -> Result<Box<dyn BrowserPage>> {
        let browser = self.browser()?;
        let user_agent = self.config.user_agent.clone();
        let opened = run_blocking(move || {
            let tab = browser.new_tab()?;
            tab.set_user_agent(&user_agent, Some("en-US,en;q=0.9"), None)?;
            Ok(tab)
        })
        .await;

        match opened {
            Ok(tab) => Ok(Box::new(ChromePage { tab }) as Box<dyn BrowserPage>),
            Err(e) => {
                if !self.ping().await {
                    self.mark_disconnected();
                }
                Err(LiftlineError::BrowserUnavailable(format!("could not open page: {}", e)))
            }
        }
    }

    async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    async fn close(&self) {
        if let Some(handle) = self.watchdog.lock().take() {
            handle.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
        let browser = self.browser.lock().take();
        if let Some(browser) = browser {
            // Dropping the last handle kills the process.
            let _ = tokio::task::spawn_blocking(move || drop(browser)).await;
        }
        self.closed.send_replace(true);
    }
}

/// One Chrome tab.
struct ChromePage {
    tab: Arc<Tab>,
}

#[async_trait]
impl BrowserPage for ChromePage {
    #[instrument(skip(self))]
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        let tab = Arc::clone(&self.tab);
        let target = url.to_string();
        let navigation = run_blocking(move || {
            tab.set_default_timeout(timeout);
            tab.navigate_to(&target)?.wait_until_navigated()?;
            Ok(())
        });

        match tokio::time::timeout(timeout + Duration::from_secs(1), navigation).await {
            Ok(Ok(())) => {
                debug!(url, "Page loaded");
                Ok(())
            }
            Ok(Err(e)) => Err(LiftlineError::FetchFailed(format!("navigation to {} failed: {}", url, e))),
            Err(_) => Err(LiftlineError::Timeout(format!(
                "navigation to {} after {}ms",
                url,
                timeout.as_millis()
            ))),
        }
    }

    async fn evaluate(&self, expression: &str) -> Result<Value> {
        let tab = Arc::clone(&self.tab);
        let script = stringify_expression(expression);
        let remote = run_blocking(move || tab.evaluate(&script, false))
            .await
            .map_err(|e| LiftlineError::FetchFailed(format!("evaluate failed: {}", e)))?;
        decode_stringified(remote.value)
    }

    async fn content(&self) -> Result<String> {
        let tab = Arc::clone(&self.tab);
        run_blocking(move || tab.get_content())
            .await
            .map_err(|e| LiftlineError::FetchFailed(format!("reading page content failed: {}", e)))
    }

    async fn close(&self) -> Result<()> {
        let tab = Arc::clone(&self.tab);
        if let Err(e) = run_blocking(move || tab.close(true)).await {
            debug!(error = %e, "Closing page failed");
        }
        Ok(())
    }
}

async fn run_blocking<T, F>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

/// Wraps `expression` so the page hands back JSON text instead of a remote
/// object reference.
fn stringify_expression(expression: &str) -> String {
    format!(
        "(() => {{ const __v = ({}); return __v === undefined ? 'null' : JSON.stringify(__v); }})()",
        expression
    )
}

fn decode_stringified(value: Option<Value>) -> Result<Value> {
    match value {
        Some(Value::String(text)) => Ok(serde_json::from_str(&text)?),
        None | Some(Value::Null) => Ok(Value::Null),
        Some(other) => Err(LiftlineError::JsonError(format!(
            "expected JSON text from page, got {}",
            other
        ))),
    }
}
