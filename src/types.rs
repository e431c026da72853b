use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Opaque ID types for type safety
pub type SessionCode = String;
pub type ParticipantId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    WaitingForPlayers,
    InProgress,
    Finished,
    Cancelled,
}

impl SessionState {
    /// Finished and Cancelled sessions never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Finished | SessionState::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Day,
    Night,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Mafia,
    Doctor,
    Detective,
    Citizen,
}

/// Win-evaluation grouping: Mafia against everyone else
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Faction {
    Mafia,
    Town,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NightActionKind {
    Kill,
    Shield,
    Investigate,
}

/// A Day ballot: a living target or an explicit skip
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum DayChoice {
    Target(ParticipantId),
    Skip,
}

impl DayChoice {
    pub fn target(&self) -> Option<&ParticipantId> {
        match self {
            DayChoice::Target(id) => Some(id),
            DayChoice::Skip => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub id: ParticipantId,
    pub username: String,
    pub alive: bool,
    pub role: Role,
    /// Set once a Detective has examined this participant
    pub investigated: bool,
}

impl Participant {
    pub fn new(username: String) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            username,
            alive: true,
            role: Role::Citizen,
            investigated: false,
        }
    }
}

/// Per-session limits fixed at creation time
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SessionRules {
    pub min_players: usize,
    pub max_players: usize,
}

impl Default for SessionRules {
    fn default() -> Self {
        Self {
            min_players: 4,
            max_players: 15,
        }
    }
}

/// Server-wide game settings
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub day_duration: Duration,
    pub night_duration: Duration,
    pub rules: SessionRules,
    /// Lobbies untouched for this long are dropped from memory
    pub lobby_idle_ttl: Duration,
}

impl GameConfig {
    pub fn phase_duration(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Day => self.day_duration,
            Phase::Night => self.night_duration,
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            day_duration: Duration::from_secs(90),
            night_duration: Duration::from_secs(60),
            rules: SessionRules::default(),
            lobby_idle_ttl: Duration::from_secs(30 * 60),
        }
    }
}

/// Smallest and largest table the game supports
pub const MIN_SUPPORTED_PLAYERS: usize = 4;
pub const MAX_SUPPORTED_PLAYERS: usize = 15;
