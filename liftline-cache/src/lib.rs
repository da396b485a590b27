//! # Liftline Cache
//!
//! The building blocks of the on-demand fetch path:
//!
//! - [`KeyedCacheStore`]: per-key entries with freshness and idleness timestamps
//! - [`SingleFlightGate`]: one fetch per key, everybody else waits on its outcome
//! - [`ConcurrencyLimiter`]: fast, non-blocking ceiling on browser-driven fetches
//! - [`ResourceCache`]: the three combined behind `get_or_fetch`
//! - [`StaleEvictionSweeper`]: periodic removal of entries nobody asks for
//!
//! ## Example
//!
//! ```rust,ignore
//! use liftline_cache::{CachePolicy, ResourceCache};
//!
//! let cache = ResourceCache::new("resorts", CachePolicy::resort());
//! let feed = cache.get_or_fetch("vail", || async { scrape("vail").await }).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod flight;
mod limiter;
mod resource;
mod store;
mod sweeper;

pub use flight::{Flight, FlightGuard, FlightWaiter, SingleFlightGate, WaitOutcome};
pub use limiter::{AdmitPermit, ConcurrencyLimiter};
pub use resource::{CachePolicy, CacheStats, ResourceCache};
pub use store::{CacheEntry, KeyedCacheStore};
pub use sweeper::{StaleEvictionSweeper, Sweep};
