use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use indicatif::{HumanCount, ProgressBar};
use log::{debug, info};
use walkdir::WalkDir;

use crate::error::{Error, Result};

const IMAGE_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".bmp", ".gif", ".webp", ".tif", ".tiff",
];

/// Whether a file name looks like an image. Names merely containing ".jpg"
/// count too, which catches backups like "photo.jpg.orig".
pub fn is_image(file_name: &str) -> bool {
    let name = file_name.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) || name.contains(".jpg")
}

/// Lists image files under every source directory.
///
/// Each tree is walked in sorted order. A file reachable from several source
/// directories, or through a symlink, is listed once, at the first position
/// it was reached, so earlier directories take precedence. Files are keyed by
/// canonical path so a link and its target never end up in one duplicate set.
pub fn find_image_paths(src_dirs: &[PathBuf], show_progress: bool) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    let pb = show_progress.then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_message("Scanning for images...");
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    });

    for src_dir in src_dirs {
        if !src_dir.is_dir() {
            return Err(Error::io(
                src_dir,
                std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            ));
        }
        info!("Scanning {}", src_dir.display());
        for entry in WalkDir::new(src_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| walk_error(src_dir, e))?;
            if !entry.path().is_file() {
                continue;
            }
            let key = fs::canonicalize(entry.path()).map_err(|e| Error::io(entry.path(), e))?;
            if !seen.insert(key) {
                debug!("Already listed: '{}'", entry.path().display());
                continue;
            }
            if is_image(&entry.file_name().to_string_lossy()) {
                paths.push(entry.into_path());
                if let Some(pb) = &pb {
                    pb.set_message(format!("Scanning for images... {} found", paths.len()));
                }
            }
        }
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    info!("Found {} images", HumanCount(paths.len() as u64));
    Ok(paths)
}

fn walk_error(src_dir: &Path, err: walkdir::Error) -> Error {
    let path = err.path().unwrap_or(src_dir).to_path_buf();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
    Error::Io { path, source }
}
