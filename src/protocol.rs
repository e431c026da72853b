use crate::error::GameError;
use crate::game::history::HistoryEntry;
use crate::game::session::SessionView;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateSession {
        created_by: Option<String>,
    },
    /// Join a waiting session; binds this connection to the new participant
    Join {
        code: SessionCode,
        username: String,
    },
    Start,
    Cancel,
    /// `target: None` is a skip
    DayVote {
        target: Option<ParticipantId>,
    },
    NightAction {
        target: ParticipantId,
        kind: NightActionKind,
    },
    GetSession {
        code: SessionCode,
    },
    GetHistory {
        code: SessionCode,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    SessionCreated {
        code: SessionCode,
    },
    Joined {
        code: SessionCode,
        participant_id: ParticipantId,
    },
    Ack,
    Session {
        session: SessionView,
    },
    History {
        entries: Vec<HistoryEntry>,
    },
    Event {
        code: SessionCode,
        event: GameEvent,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl From<GameError> for ServerMessage {
    fn from(e: GameError) -> Self {
        ServerMessage::Error {
            code: e.code().to_string(),
            msg: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EliminationReason {
    Vote,
    NightKill,
}

/// Everything the orchestrator announces after a committed transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameEvent {
    PlayerJoined {
        participant_id: ParticipantId,
        username: String,
    },
    GameStarted {
        players: usize,
    },
    /// Private: each participant learns their own role (Mafia also learn teammates)
    RoleAssigned {
        role: Role,
        teammates: Vec<ParticipantId>,
    },
    PhaseChanged {
        phase: Phase,
        day: u32,
    },
    VoteCast {
        voter: ParticipantId,
        choice: DayChoice,
    },
    PlayerEliminated {
        target: ParticipantId,
        reason: EliminationReason,
        vote_count: Option<u32>,
    },
    VoteTie {
        tied_targets: Vec<ParticipantId>,
    },
    NoElimination,
    /// Private to the voting Mafia member
    MafiaVoteRecorded {
        target: ParticipantId,
        votes_remaining: usize,
    },
    /// Private to the other living Mafia members
    MafiaTeammateVoted {
        voter: ParticipantId,
        target: ParticipantId,
    },
    /// Private to living Mafia: everyone voted but no single target leads
    MafiaVoteTie {
        tied_targets: Vec<ParticipantId>,
    },
    /// Private to living Mafia
    MafiaTargetChosen {
        target: ParticipantId,
    },
    /// Private to the Doctor
    ShieldRecorded {
        target: ParticipantId,
    },
    /// Private to the Detective
    InvestigationResult {
        target: ParticipantId,
        is_mafia: bool,
    },
    /// Someone was shielded from the kill; deliberately names no one
    SomeoneWasSaved,
    PlayerDiedLastNight {
        target: ParticipantId,
    },
    NoDeathsLastNight,
    GameEnded {
        winner: Faction,
    },
    GameCancelled,
}

impl GameEvent {
    /// Event kinds that may be shown to everyone while a game is running.
    ///
    /// Listed exhaustively so a new event kind has to be classified here.
    pub fn is_public_kind(&self) -> bool {
        match self {
            GameEvent::PlayerJoined { .. }
            | GameEvent::GameStarted { .. }
            | GameEvent::PhaseChanged { .. }
            | GameEvent::VoteCast { .. }
            | GameEvent::PlayerEliminated { .. }
            | GameEvent::VoteTie { .. }
            | GameEvent::NoElimination
            | GameEvent::SomeoneWasSaved
            | GameEvent::PlayerDiedLastNight { .. }
            | GameEvent::NoDeathsLastNight
            | GameEvent::GameEnded { .. }
            | GameEvent::GameCancelled => true,
            GameEvent::RoleAssigned { .. }
            | GameEvent::MafiaVoteRecorded { .. }
            | GameEvent::MafiaTeammateVoted { .. }
            | GameEvent::MafiaVoteTie { .. }
            | GameEvent::MafiaTargetChosen { .. }
            | GameEvent::ShieldRecorded { .. }
            | GameEvent::InvestigationResult { .. } => false,
        }
    }
}

/// Who an event is addressed to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "scope", content = "ids", rename_all = "snake_case")]
pub enum Audience {
    Public,
    Participants(Vec<ParticipantId>),
}

impl Audience {
    pub fn only(id: &ParticipantId) -> Self {
        Audience::Participants(vec![id.clone()])
    }

    pub fn includes(&self, participant: Option<&str>) -> bool {
        match self {
            Audience::Public => true,
            Audience::Participants(ids) => {
                participant.is_some_and(|p| ids.iter().any(|id| id == p))
            }
        }
    }
}

/// An event together with its recipients
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub audience: Audience,
    pub event: GameEvent,
}

impl Outbound {
    pub fn public(event: GameEvent) -> Self {
        Self {
            audience: Audience::Public,
            event,
        }
    }

    pub fn to(audience: Audience, event: GameEvent) -> Self {
        Self { audience, event }
    }
}

/// What goes out on the broadcast channel
#[derive(Debug, Clone)]
pub struct Envelope {
    pub code: SessionCode,
    pub audience: Audience,
    pub event: GameEvent,
}

impl Envelope {
    /// Whether a connection bound to `code`/`participant` should receive this
    pub fn is_visible_to(&self, code: &str, participant: Option<&str>) -> bool {
        self.code == code && self.audience.includes(participant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_events_are_not_public_kinds() {
        let investigation = GameEvent::InvestigationResult {
            target: "x".to_string(),
            is_mafia: true,
        };
        assert!(!investigation.is_public_kind());
        assert!(GameEvent::NoDeathsLastNight.is_public_kind());
    }

    #[test]
    fn test_envelope_visibility() {
        let env = Envelope {
            code: "ABCDEF".to_string(),
            audience: Audience::only(&"det".to_string()),
            event: GameEvent::InvestigationResult {
                target: "x".to_string(),
                is_mafia: false,
            },
        };
        assert!(env.is_visible_to("ABCDEF", Some("det")));
        assert!(!env.is_visible_to("ABCDEF", Some("other")));
        assert!(!env.is_visible_to("ABCDEF", None));
        assert!(!env.is_visible_to("ZZZZZZ", Some("det")));
    }

    #[test]
    fn test_client_message_format() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"t":"night_action","target":"p1","kind":"SHIELD"}"#)
                .unwrap();
        match msg {
            ClientMessage::NightAction { target, kind } => {
                assert_eq!(target, "p1");
                assert_eq!(kind, NightActionKind::Shield);
            }
            _ => panic!("Expected NightAction"),
        }

        let skip: ClientMessage = serde_json::from_str(r#"{"t":"day_vote","target":null}"#).unwrap();
        assert!(matches!(skip, ClientMessage::DayVote { target: None }));
    }

    #[test]
    fn test_event_serialization() {
        let msg = ServerMessage::Event {
            code: "ABCDEF".to_string(),
            event: GameEvent::PhaseChanged {
                phase: Phase::Night,
                day: 1,
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["t"], "event");
        assert_eq!(json["event"]["kind"], "phase_changed");
        assert_eq!(json["event"]["phase"], "NIGHT");
    }
}
