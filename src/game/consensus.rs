//! Plurality resolution shared by Day eliminations and Mafia night votes.

use crate::types::ParticipantId;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consensus {
    /// Exactly one target holds the highest count
    Chosen { target: ParticipantId, votes: u32 },
    /// Several targets share the highest count
    Tie { targets: Vec<ParticipantId>, votes: u32 },
    /// Nothing to tally (everyone skipped, or no votes at all)
    NoVotes,
}

impl Consensus {
    pub fn chosen(&self) -> Option<&ParticipantId> {
        match self {
            Consensus::Chosen { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// Count votes per target
pub fn tally<'a, I>(choices: I) -> HashMap<ParticipantId, u32>
where
    I: IntoIterator<Item = &'a ParticipantId>,
{
    let mut counts: HashMap<ParticipantId, u32> = HashMap::new();
    for target in choices {
        *counts.entry(target.clone()).or_insert(0) += 1;
    }
    counts
}

/// Reduce a set of choices to a single target, or no result on a tie.
///
/// Skips must already be filtered out by the caller. Tied targets are returned
/// sorted so the result does not depend on map iteration order.
pub fn resolve<'a, I>(choices: I) -> Consensus
where
    I: IntoIterator<Item = &'a ParticipantId>,
{
    let counts = tally(choices);

    let max = match counts.values().copied().max() {
        Some(max) if max > 0 => max,
        _ => return Consensus::NoVotes,
    };

    let mut leaders: Vec<ParticipantId> = counts
        .into_iter()
        .filter(|(_, count)| *count == max)
        .map(|(target, _)| target)
        .collect();

    if leaders.len() == 1 {
        Consensus::Chosen {
            target: leaders.remove(0),
            votes: max,
        }
    } else {
        leaders.sort();
        Consensus::Tie {
            targets: leaders,
            votes: max,
        }
    }
}
