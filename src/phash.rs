//! Perceptual hashing. The resolver only sees the [`ImageHasher`] seam; the
//! algorithm behind it is interchangeable.

use std::fmt;
use std::path::Path;

use image::ImageReader;
use image_hasher::{HashAlg, HasherConfig};
use serde::Serialize;

use crate::error::BoxError;

/// Similarity-preserving hash of an image's visual content. Equal values mean
/// the images are duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PerceptualHash(String);

impl PerceptualHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PerceptualHash {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for PerceptualHash {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A function from an image path to its perceptual hash.
pub trait ImageHasher: Sync {
    fn hash_image(&self, path: &Path) -> Result<PerceptualHash, BoxError>;
}

impl<F> ImageHasher for F
where
    F: Fn(&Path) -> Result<PerceptualHash, BoxError> + Sync,
{
    fn hash_image(&self, path: &Path) -> Result<PerceptualHash, BoxError> {
        self(path)
    }
}

/// 8x8 mean (average) hash rendered as 16 lowercase hex characters.
pub struct AverageHasher {
    hasher: image_hasher::Hasher,
}

impl AverageHasher {
    pub fn new() -> Self {
        let hasher = HasherConfig::new()
            .hash_size(8, 8)
            .hash_alg(HashAlg::Mean)
            .to_hasher();
        Self { hasher }
    }
}

impl Default for AverageHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageHasher for AverageHasher {
    fn hash_image(&self, path: &Path) -> Result<PerceptualHash, BoxError> {
        // Sniff the content so files like "photo.jpg.orig" still decode.
        let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        let hash = self.hasher.hash_image(&img);
        let hex: String = hash.as_bytes().iter().map(|b| format!("{b:02x}")).collect();
        Ok(PerceptualHash(hex))
    }
}
