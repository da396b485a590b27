//! Periodic eviction of entries nobody has asked for recently.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Something the sweeper can prune.
pub trait Sweep: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Drops idle entries as of `now`, returning how many were dropped.
    ///
    /// Entries with a fetch in flight must be left alone.
    fn sweep(&self, now: Instant) -> usize;
}

/// Runs [`Sweep::sweep`] over every registered cache on a fixed interval.
pub struct StaleEvictionSweeper {
    targets: Vec<Arc<dyn Sweep>>,
    interval: Duration,
}

impl StaleEvictionSweeper {
    /// Creates a sweeper with no targets.
    pub fn new(interval: Duration) -> Self {
        Self {
            targets: Vec::new(),
            interval,
        }
    }

    /// Adds a cache to sweep.
    pub fn register(mut self, target: Arc<dyn Sweep>) -> Self {
        self.targets.push(target);
        self
    }

    /// Sweeps every target once.
    pub fn sweep_once(&self) -> usize {
        let now = Instant::now();
        self.targets
            .iter()
            .map(|target| {
                let dropped = target.sweep(now);
                if dropped > 0 {
                    debug!(cache = target.name(), dropped, "Sweep finished");
                }
                dropped
            })
            .sum()
    }

    /// Starts sweeping in the background. The first sweep runs one interval
    /// from now. Abort the handle to stop.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.sweep_once();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CachePolicy, ResourceCache};
    use liftline_core::LiftlineError;

    fn cache() -> Arc<ResourceCache<u32>> {
        Arc::new(ResourceCache::new(
            "resorts",
            CachePolicy::new(Duration::from_secs(90), Duration::from_secs(600), Duration::from_secs(45)),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_entry_dropped_touched_entry_kept() {
        let cache = cache();
        cache.get_or_fetch("vail", || async { Ok(Some(1)) }).await.unwrap();
        cache.get_or_fetch("stowe", || async { Ok(Some(2)) }).await.unwrap();

        tokio::time::advance(Duration::from_secs(400)).await;
        cache.get_or_fetch("stowe", || async { Ok(Some(3)) }).await.unwrap();
        tokio::time::advance(Duration::from_secs(300)).await;

        let sweeper = StaleEvictionSweeper::new(Duration::from_secs(60)).register(cache.clone());
        assert_eq!(sweeper.sweep_once(), 1);
        assert!(cache.peek("vail").is_none());
        assert!(cache.peek("stowe").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_entry_never_evicted() {
        let cache = cache();
        let owner = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_fetch("vail", || async {
                        tokio::time::sleep(Duration::from_secs(900)).await;
                        Ok::<_, LiftlineError>(Some(1))
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert!(cache.is_in_flight("vail"));

        tokio::time::advance(Duration::from_secs(700)).await;
        let sweeper = StaleEvictionSweeper::new(Duration::from_secs(60)).register(cache.clone());
        assert_eq!(sweeper.sweep_once(), 0);
        assert_eq!(cache.store().len(), 1);

        assert_eq!(owner.await.unwrap().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_sweeper_runs_on_interval() {
        let cache = cache();
        cache.get_or_fetch("vail", || async { Ok(Some(1)) }).await.unwrap();

        let handle = StaleEvictionSweeper::new(Duration::from_secs(60))
            .register(cache.clone())
            .spawn();

        tokio::time::sleep(Duration::from_secs(590)).await;
        assert!(cache.peek("vail").is_some());

        tokio::time::sleep(Duration::from_secs(80)).await;
        assert!(cache.peek("vail").is_none());
        handle.abort();
    }
}
