//! Global ceiling on simultaneous browser-driven fetches.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::warn;

use liftline_core::{LiftlineError, Result};

/// Non-blocking admission control.
///
/// Excess requests are rejected immediately instead of being queued; the
/// caller decides whether to surface that or fall back to stale data.
#[derive(Clone, Debug)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    ceiling: usize,
}

/// Slot held by an admitted fetch. Dropping it releases the slot.
#[derive(Debug)]
pub struct AdmitPermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyLimiter {
    /// Creates a limiter admitting at most `ceiling` fetches at once.
    pub fn new(ceiling: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(ceiling)),
            ceiling,
        }
    }

    /// Takes a slot if one is free.
    pub fn try_admit(&self) -> Option<AdmitPermit> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| AdmitPermit { _permit: permit })
    }

    /// Takes a slot or fails with [`LiftlineError::Unavailable`].
    pub fn admit(&self, what: &str) -> Result<AdmitPermit> {
        self.try_admit().ok_or_else(|| {
            let active = self.active();
            warn!(what, active, "Rejected: {} fetches already active", active);
            LiftlineError::Unavailable(format!("{} fetches already active", active))
        })
    }

    /// Number of slots currently held.
    pub fn active(&self) -> usize {
        self.ceiling
            .saturating_sub(self.semaphore.available_permits())
    }

    /// The fixed ceiling.
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }
}
