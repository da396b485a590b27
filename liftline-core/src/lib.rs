//! # Liftline Core
//!
//! Core types, errors, and traits shared by every Liftline crate.
//!
//! - **Types**: trail-map payloads, discovered sources, Alta lift reports
//! - **Errors**: one `thiserror` hierarchy for fetch, discovery, and browser failures
//! - **Constants**: default TTLs, idle thresholds, and wait deadlines
//! - **Traits**: seams for the browser, the validation probe, and the document renderer
//!
//! ## Example
//!
//! ```rust
//! use liftline_core::{LiftlineError, SourceKind};
//!
//! let err = LiftlineError::Unavailable("3 scrapes already active".into());
//! assert!(!err.is_fetch_failure());
//! assert_eq!(SourceKind::from_url("https://x.test/map.pdf"), SourceKind::Document);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

pub use constants::*;
pub use error::{LiftlineError, Result};
pub use traits::*;
pub use types::*;
