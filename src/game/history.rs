//! Audit trail of everything a session announced.
//!
//! The full trail (private events included) is only handed out once the game
//! is finished; while it runs, readers get the public allow-list.

use crate::protocol::{Audience, GameEvent, Outbound};
use crate::types::Phase;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub seq: u64,
    pub day: u32,
    pub phase: Phase,
    /// ISO8601 timestamp
    pub at: String,
    pub audience: Audience,
    pub event: GameEvent,
}

impl HistoryEntry {
    fn is_public(&self) -> bool {
        self.audience == Audience::Public && self.event.is_public_kind()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn record(&mut self, day: u32, phase: Phase, outbound: &Outbound) {
        let seq = self.entries.len() as u64 + 1;
        self.entries.push(HistoryEntry {
            seq,
            day,
            phase,
            at: chrono::Utc::now().to_rfc3339(),
            audience: outbound.audience.clone(),
            event: outbound.event.clone(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries anyone may see during play
    pub fn public_entries(&self) -> Vec<HistoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.is_public())
            .cloned()
            .collect()
    }

    /// Every entry, including private actions and role assignments
    pub fn all_entries(&self) -> Vec<HistoryEntry> {
        self.entries.clone()
    }
}
