use crate::error::{GameError, GameResult};
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Authoritative participant list for one session, in join order
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Roster {
    participants: Vec<Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, participant: Participant) {
        self.participants.push(participant);
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Participant> {
        self.participants.iter_mut()
    }

    pub fn living(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| p.alive)
    }

    pub fn get(&self, id: &str) -> GameResult<&Participant> {
        self.participants
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| GameError::ParticipantNotFound(id.to_string()))
    }

    pub fn get_mut(&mut self, id: &str) -> GameResult<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| GameError::ParticipantNotFound(id.to_string()))
    }

    pub fn by_username(&self, username: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.username == username)
    }

    /// Count living participants, optionally restricted to one role
    pub fn living_count(&self, role: Option<Role>) -> usize {
        self.living()
            .filter(|p| role.map_or(true, |r| p.role == r))
            .count()
    }

    pub fn is_alive(&self, id: &str) -> GameResult<bool> {
        Ok(self.get(id)?.alive)
    }

    pub fn role_of(&self, id: &str) -> GameResult<Role> {
        Ok(self.get(id)?.role)
    }

    /// Mark a participant dead.
    ///
    /// Returns `true` only when this call changed them from alive to dead, so
    /// callers can announce a death at most once.
    pub fn eliminate(&mut self, id: &str) -> GameResult<bool> {
        let participant = self.get_mut(id)?;
        let was_alive = participant.alive;
        participant.alive = false;
        Ok(was_alive)
    }

    /// Join-order position, used to order tie announcements deterministically
    pub fn position(&self, id: &str) -> usize {
        self.participants
            .iter()
            .position(|p| p.id == id)
            .unwrap_or(usize::MAX)
    }

    pub fn ids_with_role(&self, role: Role) -> Vec<ParticipantId> {
        self.living()
            .filter(|p| p.role == role)
            .map(|p| p.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster_with(roles: &[Role]) -> Roster {
        let mut roster = Roster::new();
        for (i, role) in roles.iter().enumerate() {
            let mut p = Participant::new(format!("player{}", i));
            p.role = *role;
            roster.push(p);
        }
        roster
    }

    #[test]
    fn test_living_count_by_role() {
        let roster = roster_with(&[Role::Mafia, Role::Citizen, Role::Doctor, Role::Citizen]);
        assert_eq!(roster.living_count(None), 4);
        assert_eq!(roster.living_count(Some(Role::Citizen)), 2);
        assert_eq!(roster.living_count(Some(Role::Detective)), 0);
    }

    #[test]
    fn test_eliminate_is_idempotent() {
        let mut roster = roster_with(&[Role::Mafia, Role::Citizen]);
        let id = roster.iter().nth(1).unwrap().id.clone();

        assert!(roster.eliminate(&id).unwrap());
        assert!(!roster.eliminate(&id).unwrap());
        assert!(!roster.is_alive(&id).unwrap());
        assert_eq!(roster.living_count(None), 1);
    }

    #[test]
    fn test_unknown_participant() {
        let mut roster = roster_with(&[Role::Citizen]);
        assert!(matches!(
            roster.eliminate("nobody"),
            Err(GameError::ParticipantNotFound(_))
        ));
        assert!(roster.role_of("nobody").is_err());
    }

    #[test]
    fn test_join_order_is_preserved() {
        let roster = roster_with(&[Role::Citizen, Role::Citizen, Role::Citizen]);
        let names: Vec<_> = roster.iter().map(|p| p.username.as_str()).collect();
        assert_eq!(names, vec!["player0", "player1", "player2"]);
        let last = roster.iter().last().unwrap().id.clone();
        assert_eq!(roster.position(&last), 2);
    }
}
