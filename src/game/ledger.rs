use crate::error::{GameError, GameResult};
use crate::types::ParticipantId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Who has acted this phase and what they chose.
///
/// The same shape backs Day ballots (`DayChoice`) and Mafia night votes
/// (`ParticipantId`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct VoteLedger<C> {
    entries: BTreeMap<ParticipantId, C>,
}

impl<C> Default for VoteLedger<C> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<C: Clone> VoteLedger<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an actor's choice exactly once; a second call is rejected, never
    /// overwritten.
    pub fn record(&mut self, actor: &str, choice: C) -> GameResult<()> {
        if self.entries.contains_key(actor) {
            return Err(GameError::AlreadyActed(actor.to_string()));
        }
        self.entries.insert(actor.to_string(), choice);
        Ok(())
    }

    /// Record or revise an actor's choice. Returns the previous choice, if any.
    pub fn replace(&mut self, actor: &str, choice: C) -> Option<C> {
        self.entries.insert(actor.to_string(), choice)
    }

    pub fn has(&self, actor: &str) -> bool {
        self.entries.contains_key(actor)
    }

    pub fn get(&self, actor: &str) -> Option<&C> {
        self.entries.get(actor)
    }

    pub fn all(&self) -> &BTreeMap<ParticipantId, C> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
