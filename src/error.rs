//! Error taxonomy for the duplicate-detection pipeline.
//!
//! Every variant is fatal to a run: output of this crate can drive
//! irreversible deletions, so callers stop and report instead of skipping.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error returned by pluggable perceptual hash functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A file or directory could not be opened or read to completion.
    #[error("failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The perceptual hash function failed on an image.
    #[error("failed to compute perceptual hash for '{}': {source}", .path.display())]
    HashComputation {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// Image header could not be decoded to read its dimensions.
    #[error("failed to read image dimensions of '{}': {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("hash cache '{}' has schema version {found}, expected {expected}", .path.display())]
    CacheVersion {
        path: PathBuf,
        found: i64,
        expected: i64,
    },

    #[error("hash cache '{}' has an unexpected layout: {detail}", .path.display())]
    CacheSchema { path: PathBuf, detail: String },

    #[error("hash cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    /// `best` was requested for a group with no member that is largest by
    /// both bytes and pixels.
    #[error("no member is best by both bytes and pixels")]
    AmbiguousBest,

    #[error("no perceptual hash resolved for '{}'", .0.display())]
    MissingHash(PathBuf),

    #[error("invalid duplicate set selection '{0}'")]
    InvalidSelection(String),

    #[error("'{}' already exists, remove it first or use --force", .0.display())]
    PreviewExists(PathBuf),

    #[error("{0}")]
    Unsupported(&'static str),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
