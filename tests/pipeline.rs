use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{Rgb, RgbImage};
use similar_images::error::BoxError;
use similar_images::{
    AverageHasher, Clarity, HashCache, ImageHasher, KeepPolicy, NamePolicy, PerceptualHash,
    Ranking, find_duplicates, plan_actions,
};
use tempfile::tempdir;

/// Checkerboard with per-pixel jitter so larger renderings also take more
/// bytes. `inverted` swaps the squares, which changes the perceptual hash.
fn save_board(path: &Path, side: u32, inverted: bool) {
    let mut state: u32 = 0x1234_5678;
    let img = RgbImage::from_fn(side, side, |x, y| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let jitter = ((state >> 24) % 24) as u8;
        let dark = ((x * 4 / side + y * 4 / side) % 2 == 0) != inverted;
        let v = if dark { 30 + jitter } else { 200 + jitter };
        Rgb([v, v, v])
    });
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    img.save(path).unwrap();
}

struct Counting {
    inner: AverageHasher,
    calls: AtomicUsize,
}

impl ImageHasher for Counting {
    fn hash_image(&self, path: &Path) -> Result<PerceptualHash, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.hash_image(path)
    }
}

fn counting() -> Counting {
    Counting {
        inner: AverageHasher::new(),
        calls: AtomicUsize::new(0),
    }
}

fn paths(group: &similar_images::DuplicateGroup) -> Vec<PathBuf> {
    group.paths().map(Path::to_path_buf).collect()
}

#[test]
fn finds_scaled_copies_and_reuses_the_cache() {
    let photos = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let root = photos.path();
    save_board(&root.join("a_small.png"), 64, false);
    save_board(&root.join("b_other.png"), 64, true);
    save_board(&root.join("c_large.png"), 256, false);
    fs::write(root.join("notes.txt"), "not an image").unwrap();

    let mut cache = HashCache::open(cache_dir.path()).unwrap();
    let hasher = counting();
    let groups = find_duplicates(&[root.to_path_buf()], &hasher, &mut cache, false).unwrap();
    assert_eq!(hasher.calls.load(Ordering::SeqCst), 3);
    assert_eq!(groups.len(), 1);
    assert_eq!(
        paths(&groups[0]),
        vec![root.join("a_small.png"), root.join("c_large.png")]
    );

    let (small, large) = (&groups[0].files[0], &groups[0].files[1]);
    assert_eq!(small.hash, large.hash);
    assert_ne!(small.content_id, large.content_id);

    let ranking = Ranking::of(&groups[0]);
    assert_eq!(ranking.classify(), Clarity::Obvious);
    assert_eq!(ranking.first_best(), Some(1));

    let hasher = counting();
    let again = find_duplicates(&[root.to_path_buf()], &hasher, &mut cache, false).unwrap();
    assert_eq!(hasher.calls.load(Ordering::SeqCst), 0);
    assert_eq!(again, groups);
}

#[test]
fn first_source_directory_orders_the_group_and_name_by_first_keeps_its_name() {
    let photos = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let root = photos.path();
    let ordered = root.join("ordered");
    save_board(&ordered.join("001.png"), 64, false);
    save_board(&root.join("zz_hires.png"), 256, false);

    let mut cache = HashCache::open(cache_dir.path()).unwrap();
    let groups = find_duplicates(
        &[ordered.clone(), root.to_path_buf()],
        &AverageHasher::new(),
        &mut cache,
        false,
    )
    .unwrap();
    assert_eq!(groups.len(), 1);
    let group = &groups[0];
    assert_eq!(
        paths(group),
        vec![ordered.join("001.png"), root.join("zz_hires.png")]
    );

    let hires_bytes = fs::read(root.join("zz_hires.png")).unwrap();
    let ranking = Ranking::of(group);
    let actions = plan_actions(group, &ranking, KeepPolicy::Best, NamePolicy::First).unwrap();
    for action in &actions {
        action.execute(group).unwrap();
    }

    assert_eq!(fs::read(ordered.join("001.png")).unwrap(), hires_bytes);
    assert!(!root.join("zz_hires.png").exists());
}

#[test]
fn corrupt_image_aborts_the_run() {
    let photos = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let root = photos.path();
    save_board(&root.join("good.png"), 32, false);
    fs::write(root.join("broken.jpg"), b"\xff\xd8 truncated").unwrap();

    let mut cache = HashCache::open(cache_dir.path()).unwrap();
    let result = find_duplicates(&[root.to_path_buf()], &AverageHasher::new(), &mut cache, false);
    match result {
        Err(similar_images::Error::HashComputation { path, .. }) => {
            assert_eq!(path, root.join("broken.jpg"))
        }
        other => panic!("expected HashComputation, got {other:?}"),
    }
    assert!(cache.is_empty().unwrap());
}

#[cfg(unix)]
#[test]
fn symlink_to_an_image_never_pairs_with_its_target() {
    let photos = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let root = photos.path();
    let real = root.join("b_real").join("img.png");
    save_board(&real, 64, false);
    let link = root.join("a_links").join("img.png");
    fs::create_dir_all(link.parent().unwrap()).unwrap();
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let mut cache = HashCache::open(cache_dir.path()).unwrap();
    let groups = find_duplicates(&[root.to_path_buf()], &AverageHasher::new(), &mut cache, false)
        .unwrap();
    assert!(groups.is_empty());

    let summary = similar_images::dedup(
        similar_images::categorize(groups, &Default::default()).0.iter(),
        KeepPolicy::Best,
        NamePolicy::KeepBy,
    )
    .unwrap();
    assert_eq!(summary.executed, 0);
    assert!(real.exists());
    assert!(fs::read(&link).is_ok());
}
