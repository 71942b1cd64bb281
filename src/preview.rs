use std::fs;
use std::path::Path;

use log::info;

use crate::decision::Ranking;
use crate::duplicates::DuplicateGroup;
use crate::error::{Error, Result};

/// Writes a directory of symlinks, one subdirectory per duplicate set, so the
/// sets can be inspected in an image viewer before deduplicating.
///
/// Subdirectories are named `obvious-N` / `unclear-N`; links inside are
/// `N-M-<evaluation><ext>`. Counters are zero-padded to a common width.
pub fn write_preview_dir(preview_dir: &Path, force: bool, groups: &[DuplicateGroup]) -> Result<()> {
    if preview_dir.exists() {
        if !force {
            return Err(Error::PreviewExists(preview_dir.to_path_buf()));
        }
        fs::remove_dir_all(preview_dir).map_err(|e| Error::io(preview_dir, e))?;
    }
    fs::create_dir_all(preview_dir).map_err(|e| Error::io(preview_dir, e))?;

    if groups.is_empty() {
        return Ok(());
    }

    let set_width = digits(groups.len());
    let member_width = digits(groups.iter().map(DuplicateGroup::len).max().unwrap_or(1));

    for (i, group) in groups.iter().enumerate() {
        let ranking = Ranking::of(group);
        let set_dir = preview_dir.join(format!(
            "{}-{:0set_width$}",
            ranking.classify(),
            i + 1
        ));
        fs::create_dir(&set_dir).map_err(|e| Error::io(&set_dir, e))?;

        for (j, (file, evaluation)) in group
            .files
            .iter()
            .zip(ranking.evaluations(group.len()))
            .enumerate()
        {
            let extension = file
                .path
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy()))
                .unwrap_or_default();
            let link = set_dir.join(format!(
                "{:0set_width$}-{:0member_width$}-{}{}",
                i + 1,
                j + 1,
                evaluation,
                extension
            ));
            let target = std::path::absolute(&file.path).map_err(|e| Error::io(&file.path, e))?;
            symlink(&target, &link)?;
        }
    }

    info!(
        "Wrote {} duplicate sets to {}",
        groups.len(),
        preview_dir.display()
    );
    Ok(())
}

fn digits(n: usize) -> usize {
    n.max(1).ilog10() as usize + 1
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link).map_err(|e| Error::io(link, e))
}

#[cfg(not(unix))]
fn symlink(_target: &Path, _link: &Path) -> Result<()> {
    Err(Error::Unsupported("preview directories need symlink support"))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::digest::ContentId;
    use crate::duplicates::FileRecord;
    use crate::phash::PerceptualHash;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn record(path: PathBuf, bytes: u64, side: u32) -> FileRecord {
        fs::write(&path, b"img").unwrap();
        FileRecord {
            content_id: ContentId::from(path.display().to_string()),
            hash: PerceptualHash::from("00"),
            path,
            bytes,
            width: side,
            height: side,
        }
    }

    #[test]
    fn digit_widths() {
        assert_eq!(digits(1), 1);
        assert_eq!(digits(9), 1);
        assert_eq!(digits(10), 2);
        assert_eq!(digits(120), 3);
    }

    #[test]
    fn links_are_named_by_set_member_and_evaluation() {
        let src = tempdir().unwrap();
        let out = tempdir().unwrap();
        let preview = out.path().join("preview");
        let groups = vec![
            DuplicateGroup::new(vec![
                record(src.path().join("a.jpg"), 1, 1),
                record(src.path().join("b.jpg"), 2, 2),
            ]),
            DuplicateGroup::new(vec![
                record(src.path().join("c.png"), 9, 1),
                record(src.path().join("d.png"), 1, 9),
            ]),
        ];

        write_preview_dir(&preview, false, &groups).unwrap();

        let obvious = preview.join("obvious-1");
        let unclear = preview.join("unclear-2");
        assert_eq!(
            fs::read_link(obvious.join("1-1-delete.jpg")).unwrap(),
            src.path().join("a.jpg")
        );
        assert_eq!(
            fs::read_link(obvious.join("1-2-best.jpg")).unwrap(),
            src.path().join("b.jpg")
        );
        assert!(fs::symlink_metadata(unclear.join("2-1-most-bytes.png")).is_ok());
        assert!(fs::symlink_metadata(unclear.join("2-2-most-pixels.png")).is_ok());
    }

    #[test]
    fn existing_directory_needs_force() {
        let out = tempdir().unwrap();
        let preview = out.path().join("preview");
        fs::create_dir(&preview).unwrap();
        fs::write(preview.join("stale"), b"x").unwrap();

        assert!(matches!(
            write_preview_dir(&preview, false, &[]),
            Err(Error::PreviewExists(_))
        ));
        write_preview_dir(&preview, true, &[]).unwrap();
        assert!(!preview.join("stale").exists());
    }
}
