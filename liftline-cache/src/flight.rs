//! Per-key single-flight gate.
//!
//! The first caller for a key becomes the owner and runs the fetch. Everybody
//! else arriving while the fetch is running becomes a waiter and is woken with
//! the owner's outcome, or gives up after a bounded deadline.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;

use liftline_core::{normalize_key, LiftlineError, Result};

/// `None` while the fetch runs, `Some(outcome)` once the owner released.
type Outcome = Option<Result<()>>;

/// Role handed out by [`SingleFlightGate::acquire`].
pub enum Flight {
    /// This caller runs the fetch and must release the gate.
    Owner(FlightGuard),
    /// Another caller is already fetching this key.
    Waiter(FlightWaiter),
}

/// Result of waiting on somebody else's fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The owner released the gate with this outcome.
    Released(Result<()>),
    /// The deadline elapsed while the fetch was still running.
    TimedOut,
}

/// Tracks which keys have a fetch in flight.
#[derive(Clone, Default)]
pub struct SingleFlightGate {
    inflight: Arc<DashMap<String, watch::Receiver<Outcome>>>,
}

impl SingleFlightGate {
    /// Creates an empty gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Becomes the owner of `key`, or joins the fetch already running for it.
    ///
    /// Check and mark happen under one shard lock, so two callers can never
    /// both become owner.
    pub fn acquire(&self, key: &str) -> Flight {
        let key = normalize_key(key);
        match self.inflight.entry(key.clone()) {
            Entry::Occupied(e) => Flight::Waiter(FlightWaiter {
                key,
                rx: e.get().clone(),
            }),
            Entry::Vacant(e) => {
                let (tx, rx) = watch::channel(None);
                e.insert(rx);
                Flight::Owner(FlightGuard {
                    key,
                    tx,
                    inflight: Arc::clone(&self.inflight),
                    released: false,
                })
            }
        }
    }

    /// Returns true while a fetch for `key` is running.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.inflight.contains_key(&normalize_key(key))
    }

    /// Number of fetches currently running.
    pub fn in_flight_count(&self) -> usize {
        self.inflight.len()
    }
}

/// Ownership of one key's fetch.
///
/// Dropping the guard releases the gate, so waiters are woken on every exit
/// path, including panics and early returns.
pub struct FlightGuard {
    key: String,
    tx: watch::Sender<Outcome>,
    inflight: Arc<DashMap<String, watch::Receiver<Outcome>>>,
    released: bool,
}

impl FlightGuard {
    /// The key this guard owns.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Releases the gate and publishes `outcome` to the waiters.
    pub fn finish(mut self, outcome: Result<()>) {
        self.release(outcome);
    }

    fn release(&mut self, outcome: Result<()>) {
        if self.released {
            return;
        }
        self.released = true;
        self.inflight.remove(&self.key);
        self.tx.send_replace(Some(outcome));
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.release(Err(LiftlineError::FetchFailed(format!(
            "fetch for '{}' ended without an outcome",
            self.key
        ))));
    }
}

/// A caller waiting on another caller's fetch.
pub struct FlightWaiter {
    key: String,
    rx: watch::Receiver<Outcome>,
}

impl FlightWaiter {
    /// The key being waited on.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Waits for the owner to release, at most `deadline`.
    pub async fn wait(mut self, deadline: Duration) -> WaitOutcome {
        match tokio::time::timeout(deadline, self.rx.wait_for(Option::is_some)).await {
            Ok(Ok(outcome)) => WaitOutcome::Released(outcome.clone().unwrap_or(Ok(()))),
            Ok(Err(_)) => WaitOutcome::Released(Err(LiftlineError::FetchFailed(format!(
                "owner of '{}' vanished",
                self.key
            )))),
            Err(_) => WaitOutcome::TimedOut,
        }
    }
}
