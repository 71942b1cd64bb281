//! Tie-break decisions within a duplicate group.
//!
//! A group is ranked by byte size and by pixel count. When some member is
//! largest on both counts the group is *obvious*, otherwise *unclear*. A
//! ranking plus a [`KeepPolicy`] and a [`NamePolicy`] yields the filesystem
//! [`Action`]s that reduce the group to a single file.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;

use clap::ValueEnum;
use log::info;
use serde::{Deserialize, Serialize};

use crate::duplicates::DuplicateGroup;
use crate::error::{Error, Result};

/// Which member of a group survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeepPolicy {
    /// Largest by both bytes and pixels; refuses unclear groups.
    #[default]
    Best,
    MostPixels,
    MostBytes,
    /// The first discovered file.
    First,
}

/// Which file name the surviving content ends up under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamePolicy {
    /// The kept file stays where it is.
    #[default]
    KeepBy,
    /// The kept file is moved over the first discovered file.
    First,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Clarity {
    Obvious,
    Unclear,
}

impl Clarity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Obvious => "obvious",
            Self::Unclear => "unclear",
        }
    }
}

impl fmt::Display for Clarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label shown next to each member of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Evaluation {
    Best,
    MostBytes,
    MostPixels,
    Delete,
}

impl Evaluation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::MostBytes => "most-bytes",
            Self::MostPixels => "most-pixels",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index sets over a group's members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ranking {
    /// Members tied for the largest byte size.
    pub by_bytes: BTreeSet<usize>,
    /// Members tied for the largest pixel count.
    pub by_pixels: BTreeSet<usize>,
    /// Members in both sets.
    pub best: BTreeSet<usize>,
}

impl Ranking {
    pub fn of(group: &DuplicateGroup) -> Self {
        let bytes: Vec<u64> = group.files.iter().map(|f| f.bytes).collect();
        let pixels: Vec<u64> = group.files.iter().map(|f| f.pixels()).collect();
        Self::from_metrics(&bytes, &pixels)
    }

    /// Ranks from parallel slices of byte sizes and pixel counts.
    pub fn from_metrics(bytes: &[u64], pixels: &[u64]) -> Self {
        let by_bytes = indices_of_max(bytes);
        let by_pixels = indices_of_max(pixels);
        let best = by_bytes.intersection(&by_pixels).copied().collect();
        Self {
            by_bytes,
            by_pixels,
            best,
        }
    }

    /// Obvious means the two metrics don't conflict, not that there is a
    /// single winner: two members tied on both counts are still obvious.
    pub fn classify(&self) -> Clarity {
        if self.best.is_empty() {
            Clarity::Unclear
        } else {
            Clarity::Obvious
        }
    }

    pub fn first_best(&self) -> Option<usize> {
        self.best.first().copied()
    }

    pub fn first_by_bytes(&self) -> Option<usize> {
        self.by_bytes.first().copied()
    }

    pub fn first_by_pixels(&self) -> Option<usize> {
        self.by_pixels.first().copied()
    }

    /// Index kept under `policy`. Ties resolve to the lowest index.
    pub fn keep_index(&self, policy: KeepPolicy) -> Result<usize> {
        let index = match policy {
            KeepPolicy::Best => self.first_best().ok_or(Error::AmbiguousBest)?,
            KeepPolicy::MostPixels => self.first_by_pixels().unwrap_or(0),
            KeepPolicy::MostBytes => self.first_by_bytes().unwrap_or(0),
            KeepPolicy::First => 0,
        };
        Ok(index)
    }

    /// Labels for a group of `len` members. The most-bytes and most-pixels
    /// labels only appear when there is no best member.
    pub fn evaluations(&self, len: usize) -> Vec<Evaluation> {
        let best = self.first_best();
        let by_bytes = self.first_by_bytes();
        let by_pixels = self.first_by_pixels();
        (0..len)
            .map(|i| {
                if Some(i) == best {
                    Evaluation::Best
                } else if best.is_none() && Some(i) == by_bytes {
                    Evaluation::MostBytes
                } else if best.is_none() && Some(i) == by_pixels {
                    Evaluation::MostPixels
                } else {
                    Evaluation::Delete
                }
            })
            .collect()
    }
}

fn indices_of_max(values: &[u64]) -> BTreeSet<usize> {
    let Some(max) = values.iter().max() else {
        return BTreeSet::new();
    };
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| *v == max)
        .map(|(i, _)| i)
        .collect()
}

/// A filesystem step, referring to members of a [`DuplicateGroup`] by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Action {
    Remove { index: usize },
    /// Rename member `index` onto member 0's path, replacing that file.
    MoveToFirst { index: usize },
}

impl Action {
    /// Shell command equivalent, for dry runs.
    pub fn command(&self, group: &DuplicateGroup) -> String {
        match *self {
            Self::Remove { index } => {
                format!("rm {} # {}", shell_quote(group.path(index)), index)
            }
            Self::MoveToFirst { index } => format!(
                "mv {} {}",
                shell_quote(group.path(index)),
                shell_quote(group.path(0))
            ),
        }
    }

    pub fn execute(&self, group: &DuplicateGroup) -> Result<()> {
        match *self {
            Self::Remove { index } => {
                let path = group.path(index);
                fs::remove_file(path).map_err(|e| Error::io(path, e))?;
                info!("Removed {}", path.display());
            }
            Self::MoveToFirst { index } => {
                let (src, dst) = (group.path(index), group.path(0));
                fs::rename(src, dst).map_err(|e| Error::io(src, e))?;
                info!("Moved {} to {}", src.display(), dst.display());
            }
        }
        Ok(())
    }
}

/// The actions reducing `group` to one file. A rename always comes before
/// any removal, and member 0 is never removed under [`NamePolicy::First`]
/// since it is the rename target.
pub fn plan_actions(
    group: &DuplicateGroup,
    ranking: &Ranking,
    keep: KeepPolicy,
    name: NamePolicy,
) -> Result<Vec<Action>> {
    let keep_index = ranking.keep_index(keep)?;
    let mut actions = Vec::with_capacity(group.len());
    match name {
        NamePolicy::KeepBy => {
            actions.extend(
                (0..group.len())
                    .filter(|&i| i != keep_index)
                    .map(|index| Action::Remove { index }),
            );
        }
        NamePolicy::First => {
            if keep_index != 0 {
                actions.push(Action::MoveToFirst { index: keep_index });
            }
            actions.extend(
                (1..group.len())
                    .filter(|&i| i != keep_index)
                    .map(|index| Action::Remove { index }),
            );
        }
    }
    Ok(actions)
}

fn shell_quote(path: &Path) -> String {
    let s = path.to_string_lossy();
    let safe = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c));
    if safe {
        s.into_owned()
    } else {
        format!("'{}'", s.replace('\'', r#"'"'"'"#))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::ContentId;
    use crate::duplicates::FileRecord;
    use crate::phash::PerceptualHash;
    use std::path::PathBuf;

    fn group(specs: &[(&str, u64, u32, u32)]) -> DuplicateGroup {
        DuplicateGroup::new(
            specs
                .iter()
                .map(|&(path, bytes, width, height)| FileRecord {
                    path: PathBuf::from(path),
                    content_id: ContentId::from(path.to_string()),
                    hash: PerceptualHash::from("00"),
                    bytes,
                    width,
                    height,
                })
                .collect(),
        )
    }

    fn set(items: &[usize]) -> BTreeSet<usize> {
        items.iter().copied().collect()
    }

    #[test]
    fn tied_leaders_are_obvious_and_best_takes_the_lowest() {
        let ranking = Ranking::from_metrics(&[100, 100, 50], &[200, 200, 90]);
        assert_eq!(ranking.best, set(&[0, 1]));
        assert_eq!(ranking.classify(), Clarity::Obvious);
        assert_eq!(ranking.keep_index(KeepPolicy::Best).unwrap(), 0);
    }

    #[test]
    fn conflicting_metrics_are_unclear() {
        let ranking = Ranking::from_metrics(&[100, 50], &[50, 100]);
        assert_eq!(ranking.by_bytes, set(&[0]));
        assert_eq!(ranking.by_pixels, set(&[1]));
        assert!(ranking.best.is_empty());
        assert_eq!(ranking.classify(), Clarity::Unclear);
        assert!(matches!(
            ranking.keep_index(KeepPolicy::Best),
            Err(Error::AmbiguousBest)
        ));
        assert_eq!(ranking.keep_index(KeepPolicy::MostBytes).unwrap(), 0);
        assert_eq!(ranking.keep_index(KeepPolicy::MostPixels).unwrap(), 1);
        assert_eq!(ranking.keep_index(KeepPolicy::First).unwrap(), 0);
    }

    #[test]
    fn full_tie_of_two_is_obvious() {
        let ranking = Ranking::from_metrics(&[10, 10], &[4, 4]);
        assert_eq!(ranking.best, set(&[0, 1]));
        assert_eq!(ranking.classify(), Clarity::Obvious);
    }

    #[test]
    fn ranking_uses_width_times_height() {
        let g = group(&[("a", 10, 4, 4), ("b", 10, 2, 9)]);
        let ranking = Ranking::of(&g);
        assert_eq!(ranking.by_pixels, set(&[1]));
        assert_eq!(ranking.by_bytes, set(&[0, 1]));
        assert_eq!(ranking.best, set(&[1]));
    }

    #[test]
    fn name_by_first_renames_before_removing() {
        let g = group(&[("A", 1, 1, 1), ("B", 2, 2, 2), ("C", 3, 3, 3)]);
        let ranking = Ranking::of(&g);
        let actions = plan_actions(&g, &ranking, KeepPolicy::Best, NamePolicy::First).unwrap();
        assert_eq!(
            actions,
            vec![Action::MoveToFirst { index: 2 }, Action::Remove { index: 1 }]
        );
    }

    #[test]
    fn name_by_first_with_first_kept_only_removes() {
        let g = group(&[("A", 3, 3, 3), ("B", 2, 2, 2), ("C", 1, 1, 1)]);
        let ranking = Ranking::of(&g);
        let actions = plan_actions(&g, &ranking, KeepPolicy::Best, NamePolicy::First).unwrap();
        assert_eq!(
            actions,
            vec![Action::Remove { index: 1 }, Action::Remove { index: 2 }]
        );
    }

    #[test]
    fn keep_by_removes_everything_else() {
        let g = group(&[("A", 1, 1, 1), ("B", 9, 9, 9), ("C", 1, 1, 1)]);
        let ranking = Ranking::of(&g);
        let actions = plan_actions(&g, &ranking, KeepPolicy::Best, NamePolicy::KeepBy).unwrap();
        assert_eq!(
            actions,
            vec![Action::Remove { index: 0 }, Action::Remove { index: 2 }]
        );
    }

    #[test]
    fn best_on_unclear_group_plans_nothing() {
        let g = group(&[("A", 100, 5, 5), ("B", 50, 10, 10)]);
        let ranking = Ranking::of(&g);
        assert!(matches!(
            plan_actions(&g, &ranking, KeepPolicy::Best, NamePolicy::KeepBy),
            Err(Error::AmbiguousBest)
        ));
        let actions =
            plan_actions(&g, &ranking, KeepPolicy::MostPixels, NamePolicy::First).unwrap();
        assert_eq!(actions, vec![Action::MoveToFirst { index: 1 }]);
    }

    #[test]
    fn evaluations_label_leaders() {
        let obvious = Ranking::from_metrics(&[5, 9, 9], &[5, 9, 9]);
        assert_eq!(
            obvious.evaluations(3),
            vec![Evaluation::Delete, Evaluation::Best, Evaluation::Delete]
        );

        let unclear = Ranking::from_metrics(&[100, 50, 1], &[50, 100, 1]);
        assert_eq!(
            unclear.evaluations(3),
            vec![Evaluation::MostBytes, Evaluation::MostPixels, Evaluation::Delete]
        );
    }

    #[test]
    fn commands_quote_paths() {
        let g = group(&[("/photos/a b.jpg", 1, 1, 1), ("/photos/it's.jpg", 2, 2, 2)]);
        assert_eq!(
            Action::Remove { index: 0 }.command(&g),
            "rm '/photos/a b.jpg' # 0"
        );
        assert_eq!(
            Action::MoveToFirst { index: 1 }.command(&g),
            r#"mv '/photos/it'"'"'s.jpg' '/photos/a b.jpg'"#
        );
        let plain = group(&[("/p/x.png", 1, 1, 1)]);
        assert_eq!(Action::Remove { index: 0 }.command(&plain), "rm /p/x.png # 0");
    }

    #[test]
    fn execute_moves_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = ["a", "b", "c"].iter().map(|n| dir.path().join(n)).collect();
        for (i, path) in paths.iter().enumerate() {
            fs::write(path, format!("content {i}")).unwrap();
        }
        let g = DuplicateGroup::new(
            paths
                .iter()
                .map(|path| FileRecord {
                    path: path.clone(),
                    content_id: ContentId::from(String::new()),
                    hash: PerceptualHash::from("00"),
                    bytes: 0,
                    width: 0,
                    height: 0,
                })
                .collect(),
        );

        for action in [Action::MoveToFirst { index: 2 }, Action::Remove { index: 1 }] {
            action.execute(&g).unwrap();
        }
        assert_eq!(fs::read_to_string(&paths[0]).unwrap(), "content 2");
        assert!(!paths[1].exists());
        assert!(!paths[2].exists());
    }
}
