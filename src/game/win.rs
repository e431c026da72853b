use crate::game::roster::Roster;
use crate::types::{Faction, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Continue,
    Winner(Faction),
}

/// Mafia wins on reaching parity with the town; the town wins when no Mafia
/// remain. Pure: persisting the result and stopping the clock is the caller's job.
pub fn evaluate(roster: &Roster) -> Verdict {
    let mafia = roster.living_count(Some(Role::Mafia));
    let town = roster.living_count(None) - mafia;

    if mafia == 0 {
        Verdict::Winner(Faction::Town)
    } else if mafia >= town {
        Verdict::Winner(Faction::Mafia)
    } else {
        Verdict::Continue
    }
}
