//! # Liftline Trail Maps
//!
//! Locating, validating and preparing a resort's trail-map image.
//!
//! Resolution runs a fixed strategy chain per resort, first validated
//! candidate wins:
//!
//! 1. **override**: a known asset URL from the resort's profile
//! 2. **live-page**: `<img>` elements on the rendered map page whose naming
//!    looks like a winter trail map
//! 3. **document**: a trail-map PDF linked from the same page, or its image
//!    sibling when the host publishes one
//!
//! Resorts with a `direct_url` skip the chain. Documents are rendered to PNG
//! and any image may be cropped to its top N% before it is cached.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod discovery;
mod fetch;
mod page;
mod profile;
mod render;
mod service;

pub use discovery::ResourceDiscoveryPipeline;
pub use fetch::{HttpSourceClient, SourceDownloader};
pub use page::{BrowserPageLoader, PageImage, PageLoader, PageSnapshot};
pub use profile::{ProfileTable, TrailMapProfile};
pub use render::{crop_top, PopplerRenderer};
pub use service::TrailMapService;
