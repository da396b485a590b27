//! Domain types for Liftline.
//!
//! - [`TrailMapPayload`]: cached trail-map image bytes
//! - [`DiscoveredSource`]: a candidate trail-map location found by discovery
//! - [`AltaReport`]: the normalised Alta lift report
//! - [`ResortFeed`]: the opaque terrain feed scraped from a resort page

mod alta;
mod resort;
mod trail_map;

pub use alta::*;
pub use resort::*;
pub use trail_map::*;
