//! Shared headless browser for Liftline.
//!
//! One browser process serves every scrape. [`BrowserLifecycleManager`]
//! launches it lazily, lets concurrent callers share a single launch, backs
//! off after a failed launch, and forgets the session when it disconnects so
//! the next request relaunches. [`ChromeLauncher`] is the production backend.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod chrome;
mod manager;

pub use chrome::{ChromeConfig, ChromeLauncher};
pub use manager::{BrowserLifecycleManager, BrowserStatus};
