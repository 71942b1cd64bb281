use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use image::ImageReader;
use log::info;
use serde::Serialize;

use crate::cache::HashCache;
use crate::digest::ContentId;
use crate::error::{Error, Result};
use crate::phash::{ImageHasher, PerceptualHash};
use crate::resolver::{Resolution, resolve};
use crate::scanner::find_image_paths;

/// A file in a duplicate group with the attributes the decision engine ranks by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub content_id: ContentId,
    pub hash: PerceptualHash,
    pub bytes: u64,
    pub width: u32,
    pub height: u32,
}

impl FileRecord {
    /// Reads the byte size and image dimensions of `path`. Only the image
    /// header is decoded.
    pub fn load(path: &Path, content_id: ContentId, hash: PerceptualHash) -> Result<Self> {
        let bytes = fs::metadata(path).map_err(|e| Error::io(path, e))?.len();
        let (width, height) = ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| Error::io(path, e))?
            .into_dimensions()
            .map_err(|source| Error::Image {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            content_id,
            hash,
            bytes,
            width,
            height,
        })
    }

    pub fn pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Two or more files sharing one perceptual hash, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub files: Vec<FileRecord>,
}

impl DuplicateGroup {
    pub fn new(files: Vec<FileRecord>) -> Self {
        Self { files }
    }

    /// Builds a group, reading every member's attributes up front. Digests
    /// and hashes come from `resolution`.
    pub fn load(paths: &[PathBuf], resolution: &Resolution) -> Result<Self> {
        let files = paths
            .iter()
            .map(|path| {
                let content_id = resolution
                    .digests
                    .get(path)
                    .ok_or_else(|| Error::MissingHash(path.clone()))?;
                let hash = resolution
                    .hashes
                    .get(path)
                    .ok_or_else(|| Error::MissingHash(path.clone()))?;
                FileRecord::load(path, content_id.clone(), hash.clone())
            })
            .collect::<Result<_>>()?;
        Ok(Self { files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn path(&self, index: usize) -> &Path {
        &self.files[index].path
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|f| f.path.as_path())
    }
}

/// Buckets `paths` by perceptual hash and keeps buckets of two or more.
///
/// Buckets come out in the order their hash was first seen and members keep
/// their relative order from `paths`.
pub fn group_by_hash(
    paths: &[PathBuf],
    hashes: &HashMap<PathBuf, PerceptualHash>,
) -> Result<Vec<Vec<PathBuf>>> {
    let mut bucket_of: HashMap<&PerceptualHash, usize> = HashMap::new();
    let mut buckets: Vec<Vec<PathBuf>> = Vec::new();

    for path in paths {
        let hash = hashes
            .get(path)
            .ok_or_else(|| Error::MissingHash(path.clone()))?;
        let index = *bucket_of.entry(hash).or_insert_with(|| {
            buckets.push(Vec::new());
            buckets.len() - 1
        });
        buckets[index].push(path.clone());
    }

    buckets.retain(|bucket| bucket.len() > 1);
    Ok(buckets)
}

/// Runs the whole pipeline: discovery, hash resolution against the cache,
/// grouping, and loading of group members.
pub fn find_duplicates<H: ImageHasher + ?Sized>(
    src_dirs: &[PathBuf],
    hasher: &H,
    cache: &mut HashCache,
    show_progress: bool,
) -> Result<Vec<DuplicateGroup>> {
    let paths = find_image_paths(src_dirs, show_progress)?;
    let resolution = resolve(&paths, hasher, cache, show_progress)?;
    let groups = group_by_hash(&paths, &resolution.hashes)?
        .iter()
        .map(|paths| DuplicateGroup::load(paths, &resolution))
        .collect::<Result<Vec<_>>>()?;

    let total_duplicates: usize = groups.iter().map(|g| g.len() - 1).sum();
    info!(
        "Found {} duplicate sets ({} redundant images)",
        groups.len(),
        total_duplicates
    );
    Ok(groups)
}
