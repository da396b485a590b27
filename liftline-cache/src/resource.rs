//! Cache-or-fetch orchestration for one class of resource.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use liftline_core::{
    constants::{
        ALTA_CACHE_TTL, ALTA_WAIT_DEADLINE, RESORT_CACHE_TTL, RESORT_STALE_DROP, RESORT_WAIT_DEADLINE,
        TRAILMAP_CACHE_TTL, TRAILMAP_STALE_DROP, TRAILMAP_WAIT_DEADLINE,
    },
    normalize_key, LiftlineError, Result,
};

use crate::flight::{Flight, FlightWaiter, SingleFlightGate, WaitOutcome};
use crate::store::{CacheEntry, KeyedCacheStore};
use crate::sweeper::Sweep;

/// Timing rules for one resource class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachePolicy {
    /// Values younger than this are served without refetching
    pub ttl: Duration,
    /// Entries not requested for this long are evicted by the sweeper
    pub idle_after: Duration,
    /// How long a caller waits on another caller's fetch
    pub wait_deadline: Duration,
}

impl CachePolicy {
    /// Creates a policy.
    pub fn new(ttl: Duration, idle_after: Duration, wait_deadline: Duration) -> Self {
        Self {
            ttl,
            idle_after,
            wait_deadline,
        }
    }

    /// Defaults for resort terrain feeds.
    pub fn resort() -> Self {
        Self::new(RESORT_CACHE_TTL, RESORT_STALE_DROP, RESORT_WAIT_DEADLINE)
    }

    /// Defaults for trail-map images.
    pub fn trail_map() -> Self {
        Self::new(TRAILMAP_CACHE_TTL, TRAILMAP_STALE_DROP, TRAILMAP_WAIT_DEADLINE)
    }

    /// Defaults for the Alta report.
    pub fn alta() -> Self {
        Self::new(ALTA_CACHE_TTL, RESORT_STALE_DROP, ALTA_WAIT_DEADLINE)
    }
}

/// Counters for `/health`.
#[derive(Clone, Debug, Serialize)]
pub struct CacheStats {
    /// Cache class name
    pub name: String,
    /// Entries in the store, including empty ones
    pub entries: usize,
    /// Entries holding a value
    pub populated: usize,
    /// Entries holding a value younger than the TTL
    pub fresh: usize,
    /// Fetches currently running
    pub in_flight: usize,
}

/// A [`KeyedCacheStore`] and a [`SingleFlightGate`] driven by one [`CachePolicy`].
///
/// `get_or_fetch` is the whole fetch path: fresh hit, join an in-flight
/// fetch, or become the fetcher and commit the result.
pub struct ResourceCache<T> {
    name: &'static str,
    store: KeyedCacheStore<T>,
    gate: SingleFlightGate,
    policy: CachePolicy,
}

impl<T> ResourceCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates an empty cache.
    pub fn new(name: &'static str, policy: CachePolicy) -> Self {
        Self {
            name,
            store: KeyedCacheStore::new(),
            gate: SingleFlightGate::new(),
            policy,
        }
    }

    /// Returns the cached value for `key`, fetching it when stale or absent.
    ///
    /// - A fresh value is returned without touching `fetch`.
    /// - If another caller is already fetching `key`, this call waits for it
    ///   (bounded by the policy's wait deadline) and never fetches itself.
    /// - Otherwise `fetch` runs on its own task, so dropping this future does
    ///   not cancel it; the result is still committed for later callers.
    ///
    /// `fetch` returning `Ok(None)` or `Err` leaves any previous value in
    /// place. An error is returned only when there is no value at all.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<T>>> + Send + 'static,
    {
        let key = normalize_key(key);
        let now = Instant::now();
        let entry = self.store.touch(&key, now);
        if entry.is_fresh(self.policy.ttl, now) {
            if let Some(value) = entry.value {
                debug!(cache = self.name, key = %key, "Cache hit");
                return Ok(value);
            }
        }

        let guard = match self.gate.acquire(&key) {
            Flight::Owner(guard) => guard,
            Flight::Waiter(waiter) => return self.wait_on(&key, waiter).await,
        };

        // The previous owner may have committed between our freshness check
        // and acquiring the gate.
        if let Some(value) = self.store.fresh_value(&key, self.policy.ttl, Instant::now()) {
            guard.finish(Ok(()));
            return Ok(value);
        }

        debug!(cache = self.name, key = %key, "Cache miss, fetching");
        let store = self.store.clone();
        let name = self.name;
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let outcome = match fetch().await {
                Ok(Some(value)) => {
                    store.commit(&task_key, value, Instant::now());
                    Ok(())
                }
                Ok(None) => Err(LiftlineError::NoData(format!(
                    "{} fetch for '{}' returned nothing",
                    name, task_key
                ))),
                Err(e) => Err(e),
            };
            guard.finish(outcome.clone());
            outcome
        });

        let outcome = task
            .await
            .unwrap_or_else(|e| Err(LiftlineError::InternalError(format!("fetch task failed: {}", e))));
        self.settle(&key, outcome)
    }

    async fn wait_on(&self, key: &str, waiter: FlightWaiter) -> Result<T> {
        debug!(cache = self.name, key, "Fetch in flight, waiting");
        match waiter.wait(self.policy.wait_deadline).await {
            WaitOutcome::Released(outcome) => self.settle(key, outcome),
            WaitOutcome::TimedOut => {
                warn!(
                    cache = self.name,
                    key,
                    waited_ms = self.policy.wait_deadline.as_millis() as u64,
                    "Gave up waiting on in-flight fetch"
                );
                self.store.value(key).ok_or_else(|| {
                    LiftlineError::NoData(format!("fetch for '{}' still in progress", key))
                })
            }
        }
    }

    /// Whatever is cached wins; the outcome only matters when nothing is.
    fn settle(&self, key: &str, outcome: Result<()>) -> Result<T> {
        match (self.store.value(key), outcome) {
            (Some(value), Ok(())) => Ok(value),
            (Some(value), Err(e)) => {
                warn!(cache = self.name, key, error = %e, "Fetch failed, serving last known value");
                Ok(value)
            }
            (None, Ok(())) => Err(LiftlineError::NoData(format!("'{}' was evicted during fetch", key))),
            (None, Err(e)) => Err(e),
        }
    }

    /// Returns the cached value without fetching or touching the entry.
    pub fn peek(&self, key: &str) -> Option<T> {
        self.store.value(key)
    }

    /// Returns a snapshot of every entry.
    pub fn entries(&self) -> Vec<CacheEntry<T>> {
        self.store.snapshot()
    }

    /// Returns true while a fetch for `key` is running.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.gate.is_in_flight(key)
    }

    /// The underlying store.
    pub fn store(&self) -> &KeyedCacheStore<T> {
        &self.store
    }

    /// The timing policy.
    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Cache class name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns counters for reporting.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self.store.snapshot();
        CacheStats {
            name: self.name.to_string(),
            entries: entries.len(),
            populated: entries.iter().filter(|e| e.value.is_some()).count(),
            fresh: entries.iter().filter(|e| e.is_fresh(self.policy.ttl, now)).count(),
            in_flight: self.gate.in_flight_count(),
        }
    }
}

impl<T> Sweep for ResourceCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        self.name
    }

    fn sweep(&self, now: Instant) -> usize {
        let gate = &self.gate;
        let dropped = self
            .store
            .evict_idle(self.policy.idle_after, now, |key| gate.is_in_flight(key));
        for (key, idle) in &dropped {
            tracing::info!(
                cache = self.name,
                key = %key,
                idle_secs = idle.as_secs(),
                "Dropping from cache (idle {}s)",
                idle.as_secs()
            );
        }
        dropped.len()
    }
}
