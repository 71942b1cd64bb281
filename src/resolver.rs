use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use indicatif::{HumanCount, ProgressBar, ProgressStyle};
use log::{debug, info};
use rayon::prelude::*;

use crate::cache::HashCache;
use crate::digest::{ContentId, content_id};
use crate::error::{Error, Result};
use crate::phash::{ImageHasher, PerceptualHash};

/// Below this many cache misses no progress bar is drawn.
pub const PROGRESS_MIN_MISSING: usize = 200;

/// Outcome of [`resolve`]. The counters are informational.
#[derive(Debug, Default)]
pub struct Resolution {
    pub hashes: HashMap<PathBuf, PerceptualHash>,
    pub digests: HashMap<PathBuf, ContentId>,
    /// Distinct digests found in the cache.
    pub cache_hits: usize,
    /// Distinct digests that had to be hashed.
    pub computed: usize,
}

/// Maps every path to its perceptual hash, consulting `cache` first and
/// hashing only digests it hasn't seen. New hashes are stored in one
/// transaction. Any failure aborts the whole resolution.
pub fn resolve<H: ImageHasher + ?Sized>(
    paths: &[PathBuf],
    hasher: &H,
    cache: &mut HashCache,
    show_progress: bool,
) -> Result<Resolution> {
    info!("Computing digests of {} files", HumanCount(paths.len() as u64));
    let digests: Vec<ContentId> = paths
        .par_iter()
        .map(|path| content_id(path))
        .collect::<Result<_>>()?;

    let mut known: HashMap<&ContentId, PerceptualHash> = HashMap::new();
    // Representative path per missing digest, in first-seen order.
    let mut missing: Vec<(&ContentId, &PathBuf)> = Vec::new();
    let mut missing_seen: HashSet<&ContentId> = HashSet::new();
    for (digest, path) in digests.iter().zip(paths) {
        if known.contains_key(digest) || missing_seen.contains(digest) {
            continue;
        }
        match cache.lookup(digest)? {
            Some(hash) => {
                known.insert(digest, hash);
            }
            None => {
                missing_seen.insert(digest);
                missing.push((digest, path));
            }
        }
    }
    let cache_hits = known.len();
    info!(
        "{} distinct images cached, {} to hash",
        HumanCount(cache_hits as u64),
        HumanCount(missing.len() as u64)
    );

    let progress_bar = (show_progress && missing.len() > PROGRESS_MIN_MISSING).then(|| {
        let pb = ProgressBar::new(missing.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(concat!(
                    "{spinner:.green} [{elapsed_precise}] ",
                    "[{bar:40.cyan/blue}] {pos}/{len} ETA: {eta}"
                ))
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    });

    let computed: Vec<(ContentId, PerceptualHash)> = missing
        .par_iter()
        .map(|(digest, path)| -> Result<(ContentId, PerceptualHash)> {
            let hash = hasher.hash_image(path).map_err(|source| Error::HashComputation {
                path: path.to_path_buf(),
                source,
            })?;
            debug!("Perceptual hash of '{}': {}", path.display(), hash);
            if let Some(pb) = &progress_bar {
                pb.inc(1);
            }
            Ok(((*digest).clone(), hash))
        })
        .collect::<Result<_>>()?;

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }

    cache.insert_all(&computed)?;

    let fresh: HashMap<&ContentId, &PerceptualHash> =
        computed.iter().map(|(digest, hash)| (digest, hash)).collect();
    let mut hashes = HashMap::with_capacity(paths.len());
    let mut digest_of = HashMap::with_capacity(paths.len());
    for (digest, path) in digests.iter().zip(paths) {
        let hash = known
            .get(digest)
            .or_else(|| fresh.get(digest).copied())
            .ok_or_else(|| Error::MissingHash(path.clone()))?;
        hashes.insert(path.clone(), hash.clone());
        digest_of.insert(path.clone(), digest.clone());
    }

    Ok(Resolution {
        hashes,
        digests: digest_of,
        cache_hits,
        computed: computed.len(),
    })
}
