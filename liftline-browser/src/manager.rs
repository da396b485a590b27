//! Browser lifecycle: Absent → Launching → Connected → (Disconnected → Absent).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn};

use liftline_core::{
    constants::{BROWSER_LAUNCH_COOLDOWN, BROWSER_LAUNCH_WAIT},
    BrowserLauncher, BrowserSession, LiftlineError, Result,
};

/// Reported browser state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserStatus {
    /// No session and nothing in progress
    Absent,
    /// A launch is running
    Launching,
    /// A live session is available
    Connected,
    /// The last launch failed; launches are refused until the cooldown ends
    Cooldown,
}

impl fmt::Display for BrowserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BrowserStatus::Absent => "absent",
            BrowserStatus::Launching => "launching",
            BrowserStatus::Connected => "connected",
            BrowserStatus::Cooldown => "cooldown",
        };
        f.write_str(s)
    }
}

#[derive(Default)]
struct State {
    session: Option<Arc<dyn BrowserSession>>,
    launching: bool,
    cooldown_until: Option<Instant>,
}

/// Owns the one shared browser session.
pub struct BrowserLifecycleManager {
    launcher: Arc<dyn BrowserLauncher>,
    state: Arc<Mutex<State>>,
    /// Bumped every time a launch attempt ends, successful or not.
    launches: watch::Sender<u64>,
    cooldown: Duration,
    launch_wait: Duration,
}

impl BrowserLifecycleManager {
    /// Creates a manager with the default cooldown and launch wait.
    pub fn new(launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self::with_timing(launcher, BROWSER_LAUNCH_COOLDOWN, BROWSER_LAUNCH_WAIT)
    }

    /// Creates a manager with explicit timing.
    pub fn with_timing(launcher: Arc<dyn BrowserLauncher>, cooldown: Duration, launch_wait: Duration) -> Self {
        let (launches, _) = watch::channel(0);
        Self {
            launcher,
            state: Arc::new(Mutex::new(State::default())),
            launches,
            cooldown,
            launch_wait,
        }
    }

    /// Returns the live session, launching one if needed.
    ///
    /// Only one launch runs at a time; other callers wait for it (at most the
    /// launch wait) and share its session. After a failed launch every call
    /// fails immediately until the cooldown has passed.
    pub async fn ensure(&self) -> Result<Arc<dyn BrowserSession>> {
        // Subscribe before looking at the state so a launch that finishes
        // right after the check is still observed.
        let launches = self.launches.subscribe();
        let must_wait = {
            let mut state = self.state.lock();
            if let Some(session) = &state.session {
                if session.is_connected() {
                    return Ok(Arc::clone(session));
                }
                state.session = None;
            }
            if let Some(until) = state.cooldown_until {
                let now = Instant::now();
                if now < until {
                    return Err(LiftlineError::BrowserUnavailable(format!(
                        "launch on cooldown for another {}ms",
                        (until - now).as_millis()
                    )));
                }
                state.cooldown_until = None;
            }
            if state.launching {
                true
            } else {
                state.launching = true;
                false
            }
        };

        if must_wait {
            self.wait_for_launch(launches).await
        } else {
            self.launch().await
        }
    }

    async fn wait_for_launch(&self, mut launches: watch::Receiver<u64>) -> Result<Arc<dyn BrowserSession>> {
        if tokio::time::timeout(self.launch_wait, launches.changed())
            .await
            .is_err()
        {
            return Err(LiftlineError::BrowserUnavailable("launch timed out".into()));
        }
        match &self.state.lock().session {
            Some(session) if session.is_connected() => Ok(Arc::clone(session)),
            _ => Err(LiftlineError::BrowserUnavailable("launch failed".into())),
        }
    }

    async fn launch(&self) -> Result<Arc<dyn BrowserSession>> {
        let _reset = LaunchReset {
            state: &self.state,
            launches: &self.launches,
        };

        info!("Launching browser");
        match self.launcher.launch().await {
            Ok(session) => {
                self.watch_disconnect(&session);
                self.state.lock().session = Some(Arc::clone(&session));
                info!("Browser ready");
                Ok(session)
            }
            Err(e) => {
                error!(
                    error = %e,
                    cooldown_ms = self.cooldown.as_millis() as u64,
                    "Browser launch failed"
                );
                self.state.lock().cooldown_until = Some(Instant::now() + self.cooldown);
                Err(LiftlineError::BrowserUnavailable(format!("launch failed: {}", e)))
            }
        }
    }

    fn watch_disconnect(&self, session: &Arc<dyn BrowserSession>) {
        let state = Arc::clone(&self.state);
        let watched = Arc::clone(session);
        tokio::spawn(async move {
            watched.closed().await;
            let mut state = state.lock();
            if state
                .session
                .as_ref()
                .is_some_and(|current| same_session(current, &watched))
            {
                warn!("Browser disconnected; next request relaunches");
                state.session = None;
            }
        });
    }

    /// Called after a fetch failed. Drops the session if it is no longer
    /// connected so the next caller relaunches.
    pub fn report_failure(&self) {
        let mut state = self.state.lock();
        if state.session.as_ref().is_some_and(|s| !s.is_connected()) {
            warn!("Browser found disconnected after a failed fetch");
            state.session = None;
        }
    }

    /// Closes the session, if any.
    pub async fn shutdown(&self) {
        let session = self.state.lock().session.take();
        if let Some(session) = session {
            info!("Closing browser");
            session.close().await;
        }
    }

    /// Current state for health reporting.
    pub fn status(&self) -> BrowserStatus {
        let state = self.state.lock();
        if state.launching {
            BrowserStatus::Launching
        } else if state.session.as_ref().is_some_and(|s| s.is_connected()) {
            BrowserStatus::Connected
        } else if state.cooldown_until.is_some_and(|until| Instant::now() < until) {
            BrowserStatus::Cooldown
        } else {
            BrowserStatus::Absent
        }
    }
}

fn same_session(a: &Arc<dyn BrowserSession>, b: &Arc<dyn BrowserSession>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Clears the launching flag and wakes waiters however the launch ends.
struct LaunchReset<'a> {
    state: &'a Mutex<State>,
    launches: &'a watch::Sender<u64>,
}

impl Drop for LaunchReset<'_> {
    fn drop(&mut self) {
        self.state.lock().launching = false;
        self.launches.send_modify(|n| *n += 1);
    }
}
