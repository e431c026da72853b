use crate::error::GameResult;
use crate::game::roster::Roster;
use crate::types::ParticipantId;

/// What the night's Mafia kill and Doctor shield add up to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NightOutcome {
    /// Mafia chose no one
    NoKill,
    /// The kill target was shielded and survives
    Saved { target: ParticipantId },
    /// The kill target died. `announce` is false when they were already dead,
    /// so a repeated resolution never reports the same death twice.
    Killed {
        target: ParticipantId,
        announce: bool,
    },
}

/// Decide the casualty from the pending kill and shield targets
pub fn decide(kill: Option<&ParticipantId>, shield: Option<&ParticipantId>) -> NightOutcome {
    match kill {
        None => NightOutcome::NoKill,
        Some(target) if shield == Some(target) => NightOutcome::Saved {
            target: target.clone(),
        },
        Some(target) => NightOutcome::Killed {
            target: target.clone(),
            announce: true,
        },
    }
}

/// Decide and apply the outcome to the roster
pub fn resolve(
    roster: &mut Roster,
    kill: Option<&ParticipantId>,
    shield: Option<&ParticipantId>,
) -> GameResult<NightOutcome> {
    let outcome = match decide(kill, shield) {
        NightOutcome::Killed { target, .. } => {
            let announce = roster.eliminate(&target)?;
            NightOutcome::Killed { target, announce }
        }
        other => other,
    };
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Participant;

    fn roster_of(n: usize) -> (Roster, Vec<ParticipantId>) {
        let mut roster = Roster::new();
        let mut ids = Vec::new();
        for i in 0..n {
            let p = Participant::new(format!("p{}", i));
            ids.push(p.id.clone());
            roster.push(p);
        }
        (roster, ids)
    }

    #[test]
    fn test_no_kill() {
        let (mut roster, ids) = roster_of(3);
        let outcome = resolve(&mut roster, None, Some(&ids[0])).unwrap();
        assert_eq!(outcome, NightOutcome::NoKill);
        assert_eq!(roster.living_count(None), 3);
    }

    #[test]
    fn test_shield_saves_target() {
        let (mut roster, ids) = roster_of(3);
        let outcome = resolve(&mut roster, Some(&ids[1]), Some(&ids[1])).unwrap();
        assert_eq!(
            outcome,
            NightOutcome::Saved {
                target: ids[1].clone()
            }
        );
        assert!(roster.is_alive(&ids[1]).unwrap());
    }

    #[test]
    fn test_unshielded_target_dies() {
        let (mut roster, ids) = roster_of(3);
        let outcome = resolve(&mut roster, Some(&ids[1]), Some(&ids[2])).unwrap();
        assert_eq!(
            outcome,
            NightOutcome::Killed {
                target: ids[1].clone(),
                announce: true
            }
        );
        assert!(!roster.is_alive(&ids[1]).unwrap());
    }

    #[test]
    fn test_repeated_resolution_announces_once() {
        let (mut roster, ids) = roster_of(2);
        resolve(&mut roster, Some(&ids[0]), None).unwrap();
        let again = resolve(&mut roster, Some(&ids[0]), None).unwrap();
        assert_eq!(
            again,
            NightOutcome::Killed {
                target: ids[0].clone(),
                announce: false
            }
        );
    }
}
