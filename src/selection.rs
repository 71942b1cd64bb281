use std::collections::BTreeSet;
use std::str::FromStr;

use log::info;

use crate::decision::{Clarity, KeepPolicy, NamePolicy, Ranking, plan_actions};
use crate::duplicates::DuplicateGroup;
use crate::error::{Error, Result};

/// Which duplicate sets a command applies to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    /// Only sets classified obvious.
    Obvious,
    /// Sets by 1-based number.
    Numbers(BTreeSet<usize>),
}

impl FromStr for Selection {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s == "obvious" {
            return Ok(Self::Obvious);
        }
        let numbers = s
            .split(',')
            .map(|part| match part.trim().parse::<usize>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(Error::InvalidSelection(s.to_string())),
            })
            .collect::<std::result::Result<BTreeSet<_>, _>>()?;
        Ok(Self::Numbers(numbers))
    }
}

/// A duplicate set with its 1-based number and ranking.
#[derive(Debug, Clone)]
pub struct RankedGroup {
    pub number: usize,
    pub group: DuplicateGroup,
    pub ranking: Ranking,
}

impl RankedGroup {
    pub fn clarity(&self) -> Clarity {
        self.ranking.classify()
    }
}

/// Ranks every group and splits the selected ones into obvious and unclear,
/// keeping their original numbering.
pub fn categorize(
    groups: Vec<DuplicateGroup>,
    selection: &Selection,
) -> (Vec<RankedGroup>, Vec<RankedGroup>) {
    let mut obvious = Vec::new();
    let mut unclear = Vec::new();

    for (i, group) in groups.into_iter().enumerate() {
        let number = i + 1;
        if let Selection::Numbers(numbers) = selection {
            if !numbers.contains(&number) {
                continue;
            }
        }
        let ranking = Ranking::of(&group);
        let ranked = RankedGroup {
            number,
            group,
            ranking,
        };
        match ranked.clarity() {
            Clarity::Obvious => obvious.push(ranked),
            Clarity::Unclear if *selection != Selection::Obvious => unclear.push(ranked),
            Clarity::Unclear => {}
        }
    }
    (obvious, unclear)
}

/// What [`dedup`] did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DedupSummary {
    pub executed: usize,
    /// Sets left untouched because the keep policy couldn't pick a member.
    pub skipped: Vec<(Clarity, usize)>,
}

/// Plans and executes the actions for every set in order. A set the keep
/// policy can't decide is skipped; any other error stops the run.
pub fn dedup<'a>(
    sets: impl IntoIterator<Item = &'a RankedGroup>,
    keep: KeepPolicy,
    name: NamePolicy,
) -> Result<DedupSummary> {
    let mut summary = DedupSummary::default();
    for ranked in sets {
        let actions = match plan_actions(&ranked.group, &ranked.ranking, keep, name) {
            Ok(actions) => actions,
            Err(Error::AmbiguousBest) => {
                summary.skipped.push((ranked.clarity(), ranked.number));
                continue;
            }
            Err(e) => return Err(e),
        };
        for action in &actions {
            action.execute(&ranked.group)?;
        }
        summary.executed += actions.len();
    }
    info!(
        "Performed {} actions, skipped {} unclear sets",
        summary.executed,
        summary.skipped.len()
    );
    Ok(summary)
}
