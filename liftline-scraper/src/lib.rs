//! Resort data sources.
//!
//! - [`TerrainScraper`] loads a resort's terrain page in the shared browser
//!   and reads the embedded `FR.TerrainStatusFeed` object.
//! - [`AltaClient`] fetches Alta's lift status page over plain HTTP and pulls
//!   the lift list out of the embedded JSON.
//! - [`resorts`] is the table of known terrain pages.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod alta;
pub mod resorts;
mod terrain;

pub use alta::{extract_lifts, AltaClient, AltaConfig, DEFAULT_ALTA_URL};
pub use resorts::{resort_keys, terrain_url};
pub use terrain::{TerrainScraper, TerrainScraperConfig};
