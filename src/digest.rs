use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;

use log::debug;
use serde::Serialize;

use crate::error::{Error, Result};

/// Hex digest of a file's bytes. Stable across renames and moves, so it is
/// the key of the perceptual hash cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ContentId {
    fn from(hex: String) -> Self {
        Self(hex)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reads the whole file once and returns its BLAKE3 digest as lowercase hex.
pub fn content_id(path: &Path) -> Result<ContentId> {
    let mut file = fs::File::open(path).map_err(|e| Error::io(path, e))?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0; 8192];
    let mut total_bytes = 0u64;

    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| Error::io(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
        total_bytes += bytes_read as u64;
    }

    let hex = hasher.finalize().to_hex().to_string();
    debug!("Digest of '{}': {} ({} bytes)", path.display(), hex, total_bytes);
    Ok(ContentId(hex))
}
