//! Concurrent ingestion of a country's boundary files.
//!
//! Discovery walks the country directory and feeds file paths into a bounded
//! queue drained by a fixed pool of workers. Each worker resolves a file
//! through the cache (converting it on a miss) and pushes the resulting
//! polygons into a second bounded queue. A single consumer owns the
//! [`SpatialIndex`] for the duration of the run and is the only writer.
//!
//! The run is over once discovery has finished, every worker has exited and
//! the consumer has drained the last polygon.

use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;

use rustc_hash::FxHashSet;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::cache::{content_hash, read_entry, CacheEntry, CacheStore};
use crate::convert::{convert_feature, Conversion, InvalidReason, BOUNDARY_FILE_SUFFIX};
use crate::error::{Error, Result};
use crate::index::SpatialIndex;
use crate::sphere::SphericalPolygon;
use crate::types::{Place, TaggedPolygon};

/// Progress is logged each time this many more polygons reach the consumer.
const PROGRESS_INTERVAL: usize = 1000;

/// Number of workers used when none is configured.
pub fn default_workers() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get())
}

/// Place types the consumer accepts. An empty filter accepts every type.
#[derive(Debug, Clone, Default)]
pub struct PlaceTypeFilter {
    enabled: FxHashSet<String>,
}

impl PlaceTypeFilter {
    pub fn new<I, S>(place_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: place_types.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allows(&self, place_type: &str) -> bool {
        self.enabled.is_empty() || self.enabled.contains(place_type)
    }
}

/// Counters for one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Boundary files discovered.
    pub files: usize,
    /// Files served from a valid cache entry.
    pub cache_hits: usize,
    /// Files skipped because the cache marks them invalid.
    pub cached_invalid: usize,
    /// Files run through geometry conversion.
    pub converted: usize,
    /// Converted files found to be permanently invalid.
    pub rejected: usize,
    /// Files skipped after an error.
    pub failed: usize,
    /// Polygons handed to the consumer.
    pub polygons_emitted: usize,
    /// Polygons that passed the place type filter.
    pub polygons_indexed: usize,
    /// Polygons lost to conversion errors or oversized bounds.
    pub polygons_dropped: usize,
}

impl AddAssign for IngestStats {
    fn add_assign(&mut self, other: Self) {
        self.files += other.files;
        self.cache_hits += other.cache_hits;
        self.cached_invalid += other.cached_invalid;
        self.converted += other.converted;
        self.rejected += other.rejected;
        self.failed += other.failed;
        self.polygons_emitted += other.polygons_emitted;
        self.polygons_indexed += other.polygons_indexed;
        self.polygons_dropped += other.polygons_dropped;
    }
}

/// How a single boundary file was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    /// A valid cache entry matched the file content.
    Cached(Vec<TaggedPolygon>),
    /// The cache records the file as unusable.
    CachedInvalid,
    /// The file was converted and the result stored.
    Converted {
        polygons: Vec<TaggedPolygon>,
        dropped: usize,
    },
    /// Conversion found the file unusable; the verdict was stored.
    Rejected(InvalidReason),
}

impl FileOutcome {
    fn record(&self, stats: &mut IngestStats) {
        match self {
            FileOutcome::Cached(_) => stats.cache_hits += 1,
            FileOutcome::CachedInvalid => stats.cached_invalid += 1,
            FileOutcome::Converted { dropped, .. } => {
                stats.converted += 1;
                stats.polygons_dropped += dropped;
            }
            FileOutcome::Rejected(_) => {
                stats.converted += 1;
                stats.rejected += 1;
            }
        }
    }

    fn into_polygons(self) -> Vec<TaggedPolygon> {
        match self {
            FileOutcome::Cached(polygons) | FileOutcome::Converted { polygons, .. } => polygons,
            FileOutcome::CachedInvalid | FileOutcome::Rejected(_) => Vec::new(),
        }
    }
}

/// Runs ingestion passes against one cache store.
#[derive(Debug, Clone)]
pub struct Ingestor<'a> {
    cache: &'a CacheStore,
    filter: &'a PlaceTypeFilter,
    workers: usize,
}

impl<'a> Ingestor<'a> {
    pub fn new(cache: &'a CacheStore, filter: &'a PlaceTypeFilter, workers: usize) -> Self {
        Self {
            cache,
            filter,
            workers: workers.max(1),
        }
    }

    /// Indexes every boundary file under `dir`, converting the ones the
    /// cache cannot serve.
    pub fn ingest(
        &self,
        country: &str,
        dir: &Path,
        index: &mut SpatialIndex,
    ) -> Result<IngestStats> {
        info!(
            country,
            dir = %dir.display(),
            "processing country files, this might take a while..."
        );
        self.cache.ensure_country_dir(country)?;
        let stats = self.run(country, dir, index, |path| {
            self.process_file(country, path).map(Some)
        })?;
        info!(
            country,
            files = stats.files,
            cache_hits = stats.cache_hits,
            converted = stats.converted,
            failed = stats.failed,
            polygons = stats.polygons_indexed,
            "country indexed"
        );
        Ok(stats)
    }

    /// Indexes whatever the cache holds for `country`, without looking at
    /// boundary files. Entries are trusted as they are.
    pub fn ingest_cached(&self, country: &str, index: &mut SpatialIndex) -> Result<IngestStats> {
        let dir = self.cache.country_dir(country);
        if !dir.is_dir() {
            warn!(country, dir = %dir.display(), "no cache for country");
            return Ok(IngestStats::default());
        }
        info!(country, dir = %dir.display(), "loading country from cache");
        let stats = self.run(country, &dir, index, |path| Ok(load_cached(path)))?;
        info!(
            country,
            entries = stats.files,
            failed = stats.failed,
            polygons = stats.polygons_indexed,
            "country loaded from cache"
        );
        Ok(stats)
    }

    /// Resolves one boundary file: a valid cache entry is used as is,
    /// anything else runs conversion and stores the outcome.
    pub fn process_file(&self, country: &str, path: &Path) -> Result<FileOutcome> {
        let bytes = std::fs::read(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let hash = content_hash(&bytes);

        if let Some(entry) = self.cache.lookup_hashed(country, path, &hash) {
            if !entry.valid {
                return Ok(FileOutcome::CachedInvalid);
            }
            match entry.decode_polygons() {
                Ok(polygons) => return Ok(FileOutcome::Cached(tag(&entry.place, polygons))),
                Err(e) => debug!(path = %path.display(), error = %e, "unusable cache entry"),
            }
        }

        let conversion = convert_feature(&bytes).map_err(|source| Error::BoundaryFile {
            path: path.to_path_buf(),
            source,
        })?;
        match conversion {
            Conversion::Polygons {
                place,
                polygons,
                dropped,
            } => {
                let entry = CacheEntry::valid(hash, place.clone(), &polygons);
                self.cache.store(country, path, &entry)?;
                Ok(FileOutcome::Converted {
                    polygons: tag(&place, polygons),
                    dropped,
                })
            }
            Conversion::Invalid(reason) => {
                debug!(path = %path.display(), %reason, "invalid boundary file");
                self.cache.store(country, path, &CacheEntry::invalid(hash))?;
                Ok(FileOutcome::Rejected(reason))
            }
        }
    }

    fn run<F>(
        &self,
        country: &str,
        dir: &Path,
        index: &mut SpatialIndex,
        job: F,
    ) -> Result<IngestStats>
    where
        F: Fn(&Path) -> Result<Option<FileOutcome>> + Sync,
    {
        let (path_tx, path_rx) = mpsc::sync_channel::<PathBuf>(self.workers);
        let (polygon_tx, polygon_rx) = mpsc::sync_channel::<TaggedPolygon>(self.workers);
        let path_rx = Arc::new(Mutex::new(path_rx));
        let filter = self.filter;

        thread::scope(|scope| {
            let consumer = scope.spawn(move || consume(country, polygon_rx, index, filter));

            let workers: Vec<_> = (0..self.workers)
                .map(|_| {
                    let path_rx = Arc::clone(&path_rx);
                    let (polygon_tx, job) = (polygon_tx.clone(), &job);
                    scope.spawn(move || work(&path_rx, polygon_tx, job))
                })
                .collect();
            // Workers hold the only remaining ends, so discovery and the
            // consumer both notice when every worker is gone.
            drop(path_rx);
            drop(polygon_tx);

            let discovered = discover(dir, &path_tx);
            drop(path_tx);

            let mut stats = IngestStats::default();
            let mut panicked = false;
            for worker in workers {
                match worker.join() {
                    Ok(worker_stats) => stats += worker_stats,
                    Err(_) => panicked = true,
                }
            }
            match consumer.join() {
                Ok(consumer_stats) => stats += consumer_stats,
                Err(_) => panicked = true,
            }

            stats.files = discovered?;
            if panicked {
                return Err(Error::WorkerPanicked);
            }
            Ok(stats)
        })
    }
}

fn tag(place: &Place, polygons: Vec<SphericalPolygon>) -> Vec<TaggedPolygon> {
    polygons
        .into_iter()
        .map(|polygon| TaggedPolygon {
            polygon,
            place: place.clone(),
        })
        .collect()
}

fn load_cached(path: &Path) -> Option<FileOutcome> {
    let entry = read_entry(path)?;
    if !entry.valid {
        return Some(FileOutcome::CachedInvalid);
    }
    match entry.decode_polygons() {
        Ok(polygons) => Some(FileOutcome::Cached(tag(&entry.place, polygons))),
        Err(e) => {
            error!(path = %path.display(), error = %e, "error loading cached polygons");
            None
        }
    }
}

/// Sends every boundary file under `dir` to the workers, returning how many
/// were found. Stops early if the workers are gone.
fn discover(dir: &Path, paths: &SyncSender<PathBuf>) -> Result<usize> {
    let mut found = 0;
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|source| Error::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file()
            || !entry
                .file_name()
                .to_string_lossy()
                .ends_with(BOUNDARY_FILE_SUFFIX)
        {
            continue;
        }
        if paths.send(entry.into_path()).is_err() {
            break;
        }
        found += 1;
    }
    Ok(found)
}

fn work<F>(
    paths: &Mutex<Receiver<PathBuf>>,
    polygons: SyncSender<TaggedPolygon>,
    job: &F,
) -> IngestStats
where
    F: Fn(&Path) -> Result<Option<FileOutcome>>,
{
    let mut stats = IngestStats::default();
    loop {
        let next = match paths.lock() {
            Ok(receiver) => receiver.recv(),
            Err(_) => break,
        };
        let Ok(path) = next else {
            break;
        };

        let outcome = match job(&path) {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                stats.failed += 1;
                continue;
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "error processing boundary file");
                stats.failed += 1;
                continue;
            }
        };
        outcome.record(&mut stats);

        for polygon in outcome.into_polygons() {
            if polygons.send(polygon).is_err() {
                return stats;
            }
            stats.polygons_emitted += 1;
        }
    }
    stats
}

fn consume(
    country: &str,
    polygons: Receiver<TaggedPolygon>,
    index: &mut SpatialIndex,
    filter: &PlaceTypeFilter,
) -> IngestStats {
    let mut stats = IngestStats::default();
    let mut received = 0;
    for tagged in polygons {
        received += 1;
        if received % PROGRESS_INTERVAL == 0 {
            info!(country, polygons = received, "loaded polygons");
        }
        if filter.allows(&tagged.place.place_type) {
            index.insert(tagged);
            stats.polygons_indexed += 1;
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_feature(dir: &Path, file: &str, name: &str, place_type: &str, ring: &[[f64; 2]]) {
        let properties = serde_json::json!({ "wof:name": name, "wof:placetype": place_type });
        let feature = serde_json::json!({
            "type": "Feature",
            "properties": properties,
            "geometry": { "type": "Polygon", "coordinates": [ring] },
        });
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(file), serde_json::to_vec(&feature).unwrap()).unwrap();
    }

    fn square(x: f64, y: f64) -> Vec<[f64; 2]> {
        vec![[x, y], [x + 1.0, y], [x + 1.0, y + 1.0], [x, y + 1.0], [x, y]]
    }

    fn sorted(index: &SpatialIndex) -> Vec<TaggedPolygon> {
        let mut polygons: Vec<TaggedPolygon> = index.iter().cloned().collect();
        polygons.sort_by(|a, b| a.place.name.cmp(&b.place.name));
        polygons
    }

    #[test]
    fn test_second_pass_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repos/us");
        write_feature(&repo, "1.geojson", "A", "county", &square(0.0, 0.0));
        write_feature(&repo.join("nested"), "2.geojson", "B", "county", &square(5.0, 5.0));
        fs::write(repo.join("README.md"), "not a boundary").unwrap();

        let cache = CacheStore::new(dir.path().join("cache"));
        let filter = PlaceTypeFilter::default();
        let ingestor = Ingestor::new(&cache, &filter, 2);

        let mut first = SpatialIndex::new();
        let stats = ingestor.ingest("us", &repo, &mut first).unwrap();
        assert_eq!(stats.files, 2);
        assert_eq!(stats.converted, 2);
        assert_eq!(stats.cache_hits, 0);
        assert_eq!(stats.polygons_indexed, 2);

        let mut second = SpatialIndex::new();
        let stats = ingestor.ingest("us", &repo, &mut second).unwrap();
        assert_eq!(stats.converted, 0);
        assert_eq!(stats.cache_hits, 2);
        assert_eq!(sorted(&first), sorted(&second));
    }

    #[test]
    fn test_corrupt_cache_entry_is_reconverted() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repos/us");
        write_feature(&repo, "a.geojson", "A", "county", &square(0.0, 0.0));
        write_feature(&repo, "b.geojson", "B", "county", &square(5.0, 5.0));

        let cache = CacheStore::new(dir.path().join("cache"));
        let entry = cache.entry_path("us", &repo.join("a.geojson"));
        fs::create_dir_all(entry.parent().unwrap()).unwrap();
        // polygon count of 2^62 after valid header fields
        let mut corrupt = vec![0x01, 0x00, 0x01, 0x00, 0x00, 0xfd];
        corrupt.extend_from_slice(&(1u64 << 62).to_le_bytes());
        fs::write(&entry, corrupt).unwrap();

        let filter = PlaceTypeFilter::default();
        let mut index = SpatialIndex::new();
        let stats = Ingestor::new(&cache, &filter, 2)
            .ingest("us", &repo, &mut index)
            .unwrap();
        assert_eq!(stats.converted, 2);
        assert_eq!(stats.polygons_indexed, 2);
        assert!(cache.lookup("us", &repo.join("a.geojson")).unwrap().is_some());
    }

    #[test]
    fn test_process_file_converts_at_most_once() {
        let dir = tempfile::tempdir().unwrap();
        write_feature(dir.path(), "1.geojson", "A", "county", &square(0.0, 0.0));
        let path = dir.path().join("1.geojson");
        let cache = CacheStore::new(dir.path().join("cache"));
        let filter = PlaceTypeFilter::default();
        let ingestor = Ingestor::new(&cache, &filter, 1);

        let FileOutcome::Converted { polygons, .. } = ingestor.process_file("us", &path).unwrap()
        else {
            panic!("expected a conversion");
        };
        assert_eq!(
            ingestor.process_file("us", &path).unwrap(),
            FileOutcome::Cached(polygons)
        );
    }

    #[test]
    fn test_changed_file_is_converted_again() {
        let dir = tempfile::tempdir().unwrap();
        write_feature(dir.path(), "1.geojson", "Old", "county", &square(0.0, 0.0));
        let path = dir.path().join("1.geojson");
        let cache = CacheStore::new(dir.path().join("cache"));
        let filter = PlaceTypeFilter::default();
        let ingestor = Ingestor::new(&cache, &filter, 1);
        ingestor.process_file("us", &path).unwrap();

        write_feature(dir.path(), "1.geojson", "New", "county", &square(0.0, 0.0));
        match ingestor.process_file("us", &path).unwrap() {
            FileOutcome::Converted { polygons, .. } => {
                assert_eq!(polygons[0].place.name, "New");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_invalid_file_is_never_converted_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.geojson");
        fs::write(
            &path,
            r#"{"type":"Feature","properties":{"wof:placetype":"county"},"geometry":null}"#,
        )
        .unwrap();
        let cache = CacheStore::new(dir.path().join("cache"));
        let filter = PlaceTypeFilter::default();
        let ingestor = Ingestor::new(&cache, &filter, 1);

        assert_eq!(
            ingestor.process_file("us", &path).unwrap(),
            FileOutcome::Rejected(InvalidReason::MissingName)
        );
        assert!(!cache.lookup("us", &path).unwrap().unwrap().valid);
        assert_eq!(
            ingestor.process_file("us", &path).unwrap(),
            FileOutcome::CachedInvalid
        );
    }

    #[test]
    fn test_broken_files_do_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        write_feature(&repo, "good.geojson", "Good", "county", &square(0.0, 0.0));
        fs::write(repo.join("broken.geojson"), "{ not json").unwrap();

        let cache = CacheStore::new(dir.path().join("cache"));
        let filter = PlaceTypeFilter::default();
        let mut index = SpatialIndex::new();
        let stats = Ingestor::new(&cache, &filter, 3)
            .ingest("us", &repo, &mut index)
            .unwrap();

        assert_eq!(stats.files, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(index.len(), 1);
        assert!(cache
            .lookup("us", &repo.join("broken.geojson"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_filter_keeps_only_enabled_types() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        write_feature(&repo, "1.geojson", "Springfield", "locality", &square(0.0, 0.0));

        let cache = CacheStore::new(dir.path().join("cache"));
        let filter = PlaceTypeFilter::new(["country"]);
        let mut index = SpatialIndex::new();
        let stats = Ingestor::new(&cache, &filter, 2)
            .ingest("us", &repo, &mut index)
            .unwrap();

        assert_eq!(stats.polygons_emitted, 1);
        assert_eq!(stats.polygons_indexed, 0);
        assert!(index.is_empty());
    }

    #[test]
    fn test_worker_count_does_not_change_the_index() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        for i in 0..12 {
            let offset = f64::from(i) * 2.0;
            write_feature(
                &repo,
                &format!("{i}.geojson"),
                &format!("Place {i:02}"),
                "county",
                &square(offset, offset),
            );
        }
        let filter = PlaceTypeFilter::default();

        let mut reference = None;
        for workers in [1, 2, 5, 16] {
            let cache = CacheStore::new(dir.path().join(format!("cache-{workers}")));
            let mut index = SpatialIndex::new();
            let stats = Ingestor::new(&cache, &filter, workers)
                .ingest("us", &repo, &mut index)
                .unwrap();
            assert_eq!(stats.polygons_indexed, 12);
            let polygons = sorted(&index);
            match &reference {
                None => reference = Some(polygons),
                Some(expected) => assert_eq!(&polygons, expected, "{workers} workers"),
            }
        }
    }

    #[test]
    fn test_cache_only_load_matches_full_ingest() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        write_feature(&repo, "1.geojson", "A", "county", &square(0.0, 0.0));
        fs::write(
            repo.join("2.geojson"),
            r#"{"type":"Feature","properties":{},"geometry":null}"#,
        )
        .unwrap();

        let cache = CacheStore::new(dir.path().join("cache"));
        let filter = PlaceTypeFilter::default();
        let ingestor = Ingestor::new(&cache, &filter, 2);
        let mut full = SpatialIndex::new();
        ingestor.ingest("us", &repo, &mut full).unwrap();

        fs::remove_dir_all(&repo).unwrap();
        let mut cached = SpatialIndex::new();
        let stats = ingestor.ingest_cached("us", &mut cached).unwrap();
        assert_eq!(stats.files, 2);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cached_invalid, 1);
        assert_eq!(sorted(&full), sorted(&cached));
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(dir.path().join("cache"));
        let filter = PlaceTypeFilter::default();
        let mut index = SpatialIndex::new();
        let result = Ingestor::new(&cache, &filter, 4).ingest(
            "us",
            &dir.path().join("does-not-exist"),
            &mut index,
        );
        assert!(matches!(result, Err(Error::Walk { .. })));
    }
}
