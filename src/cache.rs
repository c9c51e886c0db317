//! Per-file cache of converted polygons.
//!
//! Each boundary file gets one entry at `<root>/<country>/<file name>`,
//! holding the CRC-64 of the bytes it was built from. An entry is only
//! trusted while that checksum matches the current file; anything else,
//! including an entry that fails to decode, counts as a miss.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bincode::{Decode, Encode};
use crc::{Crc, CRC_64_GO_ISO};

use crate::error::{Error, GeometryError, Result};
use crate::sphere::{Loop, Point, SphericalPolygon};
use crate::types::Place;

/// Bumped whenever the encoding of [`CacheEntry`] changes.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Upper bound on the bytes one entry may claim while decoding, so a
/// corrupted length prefix fails instead of preallocating.
const DECODE_LIMIT: usize = 1 << 30;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

/// Lower-case hex CRC-64 (ISO polynomial) of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", CRC64.checksum(bytes))
}

/// Loops of one polygon, shell first, exactly as indexed.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct EncodedPolygon {
    pub loops: Vec<Vec<Point>>,
}

impl EncodedPolygon {
    pub fn decode(&self) -> std::result::Result<SphericalPolygon, GeometryError> {
        let loops = self
            .loops
            .iter()
            .map(|vertices| Loop::new(vertices.clone()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        SphericalPolygon::from_loops(loops)
    }
}

impl From<&SphericalPolygon> for EncodedPolygon {
    fn from(polygon: &SphericalPolygon) -> Self {
        Self {
            loops: polygon
                .loops()
                .iter()
                .map(|l| l.vertices().to_vec())
                .collect(),
        }
    }
}

/// What is persisted for one boundary file.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct CacheEntry {
    pub format_version: u32,
    pub content_hash: String,
    /// `false` records that the file can never yield polygons.
    pub valid: bool,
    pub place: Place,
    pub polygons: Vec<EncodedPolygon>,
}

impl CacheEntry {
    pub fn valid(content_hash: String, place: Place, polygons: &[SphericalPolygon]) -> Self {
        Self {
            format_version: CACHE_FORMAT_VERSION,
            content_hash,
            valid: true,
            place,
            polygons: polygons.iter().map(EncodedPolygon::from).collect(),
        }
    }

    pub fn invalid(content_hash: String) -> Self {
        Self {
            format_version: CACHE_FORMAT_VERSION,
            content_hash,
            valid: false,
            place: Place::default(),
            polygons: Vec::new(),
        }
    }

    /// Rebuilds the stored polygons.
    pub fn decode_polygons(&self) -> std::result::Result<Vec<SphericalPolygon>, GeometryError> {
        self.polygons.iter().map(EncodedPolygon::decode).collect()
    }
}

/// Cache entries on disk, isolated per country.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn country_dir(&self, country: &str) -> PathBuf {
        self.root.join(country)
    }

    /// Location of the entry for `source`, keyed by its file name only.
    pub fn entry_path(&self, country: &str, source: &Path) -> PathBuf {
        let mut path = self.country_dir(country);
        if let Some(name) = source.file_name() {
            path.push(name);
        }
        path
    }

    pub fn ensure_country_dir(&self, country: &str) -> Result<PathBuf> {
        let dir = self.country_dir(country);
        fs::create_dir_all(&dir).map_err(|source| Error::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    /// Returns the entry for `source` if it was built from the file's
    /// current content.
    pub fn lookup(&self, country: &str, source: &Path) -> Result<Option<CacheEntry>> {
        let bytes = fs::read(source).map_err(|e| Error::Read {
            path: source.to_path_buf(),
            source: e,
        })?;
        Ok(self.lookup_hashed(country, source, &content_hash(&bytes)))
    }

    /// Like [`lookup`](Self::lookup), for callers that already hashed the
    /// source bytes.
    pub fn lookup_hashed(&self, country: &str, source: &Path, hash: &str) -> Option<CacheEntry> {
        read_entry(&self.entry_path(country, source)).filter(|entry| entry.content_hash == hash)
    }

    pub fn store(&self, country: &str, source: &Path, entry: &CacheEntry) -> Result<()> {
        let path = self.entry_path(country, source);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| Error::CreateDir {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }
        let encoded = bincode::encode_to_vec(entry, bincode::config::standard())?;
        fs::write(&path, encoded).map_err(|source| Error::CacheWrite { path, source })
    }
}

/// Reads one entry file, treating anything unreadable as absent.
pub fn read_entry(path: &Path) -> Option<CacheEntry> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable cache entry");
            return None;
        }
    };
    let config = bincode::config::standard().with_limit::<{ DECODE_LIMIT }>();
    match bincode::decode_from_slice::<CacheEntry, _>(&bytes, config) {
        Ok((entry, _)) if entry.format_version == CACHE_FORMAT_VERSION => Some(entry),
        Ok((entry, _)) => {
            tracing::debug!(
                path = %path.display(),
                version = entry.format_version,
                "ignoring cache entry from another format version"
            );
            None
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "corrupt cache entry");
            None
        }
    }
}
