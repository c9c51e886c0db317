//! Error types for ingestion and geometry conversion.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building the geocoder.
///
/// Only the walk, directory and worker variants abort an ingestion; the
/// per-file variants are logged by the pipeline and the file is skipped.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write cache entry {path}: {source}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode cache entry: {0}")]
    CacheEncode(#[from] bincode::error::EncodeError),

    #[error("malformed boundary file {path}: {source}")]
    BoundaryFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("an ingestion worker panicked")]
    WorkerPanicked,

    #[error("error loading country {country:?}: {source}")]
    Country {
        country: String,
        #[source]
        source: Box<Error>,
    },
}

/// Reasons a single polygon of a boundary file is dropped.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("loop has {vertices} distinct vertices, at least 3 are needed")]
    DegenerateLoop { vertices: usize },

    #[error("polygon has no rings")]
    NoRings,

    #[error("position has {len} coordinates, at least 2 are needed")]
    MalformedPosition { len: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
