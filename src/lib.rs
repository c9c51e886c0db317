//! Reverse geocoding against administrative boundary polygons.
//!
//! `salta` resolves a latitude/longitude pair to the hierarchy of places that
//! contain it (country, region, county, locality, neighbourhood, ...) by
//! testing the point against the polygons of per-country boundary datasets
//! such as [Who's On First](https://whosonfirst.org/).
//!
//! # Features
//!
//! - **Polygon containment** - Exact point-in-polygon tests on the sphere, not nearest-neighbour guesses
//! - **Content-addressed cache** - Converted polygons are stored per file and reused while the file's CRC-64 is unchanged
//! - **Concurrent ingestion** - A bounded worker pool converts files while a single consumer builds the index
//! - **R-tree index** - Candidate polygons are found by bounding box before the exact test
//! - **Self-repairing input** - Rings wound the wrong way are detected by their bound and inverted
//! - **Lock-free queries** - The built geocoder is immutable and can be shared across threads
//!
//! # Quick Start
//!
//! Boundary files are expected under `<repos>/<country>/**/*.geojson`:
//!
//! ```no_run
//! use salta::{GeocoderSettings, ReverseGeocoder};
//!
//! let settings = GeocoderSettings {
//!     countries: vec!["us".to_string()],
//!     repos_folder: "repos".into(),
//!     cache_folder: "cache".into(),
//!     ..GeocoderSettings::default()
//! };
//! let geocoder = ReverseGeocoder::initialize(settings)?;
//!
//! let location = geocoder.locate(40.6782, -73.9442);
//! if let Some(borough) = &location.borough {
//!     println!("Borough: {borough}");
//! }
//! # Ok::<(), salta::Error>(())
//! ```
//!
//! Once the cache is warm the raw files are no longer needed:
//!
//! ```no_run
//! # use salta::{GeocoderSettings, ReverseGeocoder};
//! # let settings = GeocoderSettings::default();
//! let geocoder = ReverseGeocoder::load_from_cache_only(settings)?;
//! # Ok::<(), salta::Error>(())
//! ```
//!
//! # Architecture
//!
//! ## Ingestion
//!
//! 1. Walk `<repos>/<country>` for `.geojson` files
//! 2. Hash each file and look for a cache entry with the same hash
//! 3. On a miss, parse the feature, simplify its rings and build spherical polygons
//! 4. Store the result (or the fact that the file is unusable) in the cache
//! 5. Hand the polygons to the single index writer, which drops disabled place types
//!
//! ## Lookup
//!
//! 1. Project the coordinate onto the unit sphere
//! 2. Collect the polygons whose bounding rectangle covers it from the R-tree
//! 3. Keep those that contain the point
//! 4. Fill one [`Location`] field per place type
//!
//! A point exactly on a polygon vertex is never inside that polygon.
//!
//! # Thread Safety
//!
//! Lookups only read the index:
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::thread;
//! # use salta::{GeocoderSettings, ReverseGeocoder};
//!
//! # let settings = GeocoderSettings::default();
//! let geocoder = Arc::new(ReverseGeocoder::initialize(settings)?);
//! let handles: Vec<_> = (0..10)
//!     .map(|i| {
//!         let geocoder = Arc::clone(&geocoder);
//!         thread::spawn(move || geocoder.locate(40.0 + i as f64, -74.0))
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! # Ok::<(), salta::Error>(())
//! ```
//!
//! # Modules
//!
//! - [`types`] - Core data structures ([`Place`], [`TaggedPolygon`], [`Location`])
//! - [`sphere`] - Points, loops and polygons on the unit sphere
//! - [`convert`] - Boundary file parsing and polygon conversion
//! - [`cache`] - Per-file cache of converted polygons
//! - [`index`] - R-tree over tagged polygons
//! - [`ingest`] - The concurrent ingestion pipeline
//! - [`config`] - INI configuration loading

pub mod cache;
pub mod config;
pub mod convert;
mod error;
mod geocoder;
pub mod index;
pub mod ingest;
pub mod logging;
mod query;
pub mod sphere;
pub mod types;

pub use error::{Error, GeometryError, Result};
pub use geocoder::{GeocoderSettings, ReverseGeocoder};
pub use index::SpatialIndex;
pub use ingest::IngestStats;
pub use query::resolve_location;
pub use types::{Location, Place, PlaceType, TaggedPolygon};
