//! Settings and the reverse geocoder handle built from them.

use std::path::{Path, PathBuf};

use crate::cache::CacheStore;
use crate::error::{Error, Result};
use crate::index::SpatialIndex;
use crate::ingest::{default_workers, IngestStats, Ingestor, PlaceTypeFilter};
use crate::query::resolve_location;
use crate::types::{Location, PlaceType};

/// Parsed configuration for building a [`ReverseGeocoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocoderSettings {
    /// Country codes; boundary files live under `repos_folder/<country>`.
    pub countries: Vec<String>,
    /// Place types kept in the index. Empty keeps every type.
    pub enabled_place_types: Vec<String>,
    pub repos_folder: PathBuf,
    pub cache_folder: PathBuf,
    /// Ingestion workers; `None` uses the available parallelism.
    pub workers: Option<usize>,
}

impl Default for GeocoderSettings {
    fn default() -> Self {
        Self {
            countries: Vec::new(),
            enabled_place_types: PlaceType::ALL
                .iter()
                .map(|t| t.as_str().to_string())
                .collect(),
            repos_folder: PathBuf::from("repos"),
            cache_folder: PathBuf::from("cache"),
            workers: None,
        }
    }
}

impl GeocoderSettings {
    pub fn workers(&self) -> usize {
        self.workers.unwrap_or_else(default_workers)
    }

    pub fn repo_path(&self, country: &str) -> PathBuf {
        self.repos_folder.join(country)
    }
}

/// Reverse geocoder over an immutable, fully built index.
///
/// Construction runs the whole ingestion; afterwards the geocoder is only
/// read, so it can be shared across threads and queried concurrently.
///
/// ```no_run
/// use salta::{GeocoderSettings, ReverseGeocoder};
///
/// let settings = GeocoderSettings {
///     countries: vec!["us".to_string()],
///     ..GeocoderSettings::default()
/// };
/// let geocoder = ReverseGeocoder::initialize(settings)?;
/// let location = geocoder.locate(40.6782, -73.9442);
/// println!("{location}");
/// # Ok::<(), salta::Error>(())
/// ```
#[derive(Debug)]
pub struct ReverseGeocoder {
    settings: GeocoderSettings,
    index: SpatialIndex,
    stats: IngestStats,
}

impl ReverseGeocoder {
    /// Builds the index from every country's boundary files, reusing cached
    /// conversions where the file content is unchanged.
    pub fn initialize(settings: GeocoderSettings) -> Result<Self> {
        Self::build(settings, |ingestor, settings, country, index| {
            ingestor.ingest(country, &settings.repo_path(country), index)
        })
    }

    /// Builds the index from cache entries alone. Files that were never
    /// cached are missing from the result.
    pub fn load_from_cache_only(settings: GeocoderSettings) -> Result<Self> {
        Self::build(settings, |ingestor, _, country, index| {
            ingestor.ingest_cached(country, index)
        })
    }

    fn build<F>(settings: GeocoderSettings, mut load: F) -> Result<Self>
    where
        F: FnMut(&Ingestor<'_>, &GeocoderSettings, &str, &mut SpatialIndex) -> Result<IngestStats>,
    {
        let cache = CacheStore::new(&settings.cache_folder);
        let filter = PlaceTypeFilter::new(settings.enabled_place_types.iter().cloned());
        let ingestor = Ingestor::new(&cache, &filter, settings.workers());

        let mut index = SpatialIndex::new();
        let mut stats = IngestStats::default();
        for country in &settings.countries {
            stats += load(&ingestor, &settings, country.as_str(), &mut index).map_err(|e| {
                Error::Country {
                    country: country.clone(),
                    source: Box::new(e),
                }
            })?;
        }
        tracing::info!(
            countries = settings.countries.len(),
            polygons = index.len(),
            "index ready"
        );

        Ok(Self {
            settings,
            index,
            stats,
        })
    }

    /// The administrative hierarchy at `lat`/`lng` degrees.
    ///
    /// Coordinates are not range checked; any pair is projected onto the
    /// sphere. A point outside every boundary yields an empty [`Location`].
    pub fn locate(&self, lat: f64, lng: f64) -> Location {
        resolve_location(self.index.containing(lat, lng))
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    pub fn settings(&self) -> &GeocoderSettings {
        &self.settings
    }

    pub fn cache_folder(&self) -> &Path {
        &self.settings.cache_folder
    }
}
