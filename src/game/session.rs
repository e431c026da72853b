//! The session aggregate and its phase state machine.
//!
//! Every operation validates first and mutates second, so a rejected action
//! returns an error without touching the roster, ledgers or history. Callers
//! get back a `Transition`: the events to relay and what the phase clock
//! should do next.

use super::consensus::{self, Consensus};
use super::history::{History, HistoryEntry};
use super::ledger::VoteLedger;
use super::night::{self, NightOutcome};
use super::roles::NightDuty;
use super::roster::Roster;
use super::setup;
use super::win::{self, Verdict};
use crate::error::{GameError, GameResult};
use crate::protocol::{Audience, EliminationReason, GameEvent, Outbound};
use crate::types::*;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

const MAX_USERNAME_CHARS: usize = 24;

/// What the phase clock should do after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerDirective {
    Keep,
    Start { phase: Phase, day: u32 },
    Stop,
}

/// Result of a committed operation
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub events: Vec<Outbound>,
    pub timer: TimerDirective,
}

impl Transition {
    fn new(events: Vec<Outbound>, timer: TimerDirective) -> Self {
        Self { events, timer }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub code: SessionCode,
    pub created_by: Option<String>,
    /// ISO8601 timestamp
    pub created_at: String,
    /// Last committed change; older snapshots predate this field
    #[serde(default = "Utc::now")]
    pub last_active_at: DateTime<Utc>,
    pub rules: SessionRules,
    pub state: SessionState,
    pub day: u32,
    pub phase: Phase,
    pub winner: Option<Faction>,
    pub roster: Roster,
    pub day_votes: VoteLedger<DayChoice>,
    pub mafia_votes: VoteLedger<ParticipantId>,
    pub acted_this_night: BTreeSet<ParticipantId>,
    /// Set once every living Mafia member agreed on a single target
    pub mafia_consensus_closed: bool,
    pub pending_night_kill: Option<ParticipantId>,
    pub pending_night_shield: Option<ParticipantId>,
    pub history: History,
}

/// Participant as shown to a particular viewer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticipantView {
    pub id: ParticipantId,
    pub username: String,
    pub alive: bool,
    /// Only present when the viewer is allowed to know it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Whether they already voted this Day (never what they voted)
    pub has_voted: bool,
}

/// Lifecycle facts the registry needs to decide whether to unload a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub last_active_at: DateTime<Utc>,
}

impl SessionStatus {
    /// Terminal sessions, and lobbies nobody touched within `idle_ttl`.
    /// Running games are never reapable: their phase clock lives in memory.
    pub fn is_reapable(&self, now: DateTime<Utc>, idle_ttl: Duration) -> bool {
        if self.state.is_terminal() {
            return true;
        }
        self.state == SessionState::WaitingForPlayers
            && (now - self.last_active_at)
                .to_std()
                .is_ok_and(|idle| idle >= idle_ttl)
    }
}

/// Read-only snapshot safe to hand to a client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionView {
    pub code: SessionCode,
    pub state: SessionState,
    pub phase: Phase,
    pub day: u32,
    pub winner: Option<Faction>,
    pub participants: Vec<ParticipantView>,
    pub votes_cast: usize,
}

impl Session {
    pub fn new(code: SessionCode, created_by: Option<String>, rules: SessionRules) -> Self {
        Self {
            code,
            created_by,
            created_at: Utc::now().to_rfc3339(),
            last_active_at: Utc::now(),
            rules,
            state: SessionState::WaitingForPlayers,
            day: 0,
            phase: Phase::Day,
            winner: None,
            roster: Roster::new(),
            day_votes: VoteLedger::new(),
            mafia_votes: VoteLedger::new(),
            acted_this_night: BTreeSet::new(),
            mafia_consensus_closed: false,
            pending_night_kill: None,
            pending_night_shield: None,
            history: History::default(),
        }
    }

    /// Record an event in the audit trail and queue it for delivery
    fn announce(&mut self, events: &mut Vec<Outbound>, outbound: Outbound) {
        self.history.record(self.day, self.phase, &outbound);
        events.push(outbound);
    }

    // ========== Validation (never mutates) ==========

    fn require_waiting(&self) -> GameResult<()> {
        match self.state {
            SessionState::WaitingForPlayers => Ok(()),
            other => Err(GameError::InvalidPhase(format!(
                "Session is {:?}, not waiting for players",
                other
            ))),
        }
    }

    fn require_phase(&self, phase: Phase) -> GameResult<()> {
        match self.state {
            SessionState::InProgress => {}
            SessionState::WaitingForPlayers => {
                return Err(GameError::InvalidPhase("Game has not started".to_string()))
            }
            SessionState::Finished | SessionState::Cancelled => {
                return Err(GameError::InvalidPhase("Game is over".to_string()))
            }
        }
        if self.phase != phase {
            return Err(GameError::InvalidPhase(format!(
                "Only allowed during {:?}, current phase is {:?}",
                phase, self.phase
            )));
        }
        Ok(())
    }

    fn living_actor(&self, id: &str) -> GameResult<&Participant> {
        let actor = self.roster.get(id)?;
        if !actor.alive {
            return Err(GameError::InvalidActor(format!(
                "{} is dead and cannot act",
                actor.username
            )));
        }
        Ok(actor)
    }

    fn living_target(&self, id: &str) -> GameResult<&Participant> {
        let target = self.roster.get(id)?;
        if !target.alive {
            return Err(GameError::InvalidTarget(format!(
                "{} is dead",
                target.username
            )));
        }
        Ok(target)
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            last_active_at: self.last_active_at,
        }
    }

    /// Record that a change is about to be committed
    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }

    /// True when the clock armed for `(phase, day)` still refers to the running phase
    pub fn is_current_epoch(&self, phase: Phase, day: u32) -> bool {
        self.state == SessionState::InProgress && self.phase == phase && self.day == day
    }

    // ========== Lobby ==========

    pub fn join(&mut self, username: &str) -> GameResult<(Participant, Transition)> {
        self.require_waiting()?;
        let username = username.trim();
        if username.is_empty() || username.chars().count() > MAX_USERNAME_CHARS {
            return Err(GameError::InvalidUsername(format!(
                "must be 1 to {} characters",
                MAX_USERNAME_CHARS
            )));
        }
        if self.roster.by_username(username).is_some() {
            return Err(GameError::UsernameTaken(username.to_string()));
        }
        if self.roster.len() >= self.rules.max_players {
            return Err(GameError::SessionFull(self.rules.max_players));
        }

        let participant = Participant::new(username.to_string());
        self.roster.push(participant.clone());

        let mut events = Vec::new();
        self.announce(
            &mut events,
            Outbound::public(GameEvent::PlayerJoined {
                participant_id: participant.id.clone(),
                username: participant.username.clone(),
            }),
        );
        Ok((participant, Transition::new(events, TimerDirective::Keep)))
    }

    /// Deal roles and open the first Night
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) -> GameResult<Transition> {
        self.require_waiting()?;
        let joined = self.roster.len();
        if joined < self.rules.min_players {
            return Err(GameError::NotEnoughPlayers {
                joined,
                required: self.rules.min_players,
            });
        }

        let deck = setup::deal_roles(joined, rng);
        for (participant, role) in self.roster.iter_mut().zip(deck) {
            participant.role = role;
        }
        self.state = SessionState::InProgress;
        self.phase = Phase::Night;
        self.day = 1;

        let mut events = Vec::new();
        self.announce(
            &mut events,
            Outbound::public(GameEvent::GameStarted { players: joined }),
        );

        let mafia = self.roster.ids_with_role(Role::Mafia);
        let assignments: Vec<(ParticipantId, Role)> =
            self.roster.iter().map(|p| (p.id.clone(), p.role)).collect();
        for (id, role) in assignments {
            let teammates = if role == Role::Mafia {
                mafia.iter().filter(|m| **m != id).cloned().collect()
            } else {
                Vec::new()
            };
            self.announce(
                &mut events,
                Outbound::to(
                    Audience::only(&id),
                    GameEvent::RoleAssigned { role, teammates },
                ),
            );
        }

        self.announce(
            &mut events,
            Outbound::public(GameEvent::PhaseChanged {
                phase: Phase::Night,
                day: 1,
            }),
        );
        tracing::info!(code = %self.code, players = joined, "Game started");
        Ok(Transition::new(
            events,
            TimerDirective::Start {
                phase: Phase::Night,
                day: 1,
            },
        ))
    }

    pub fn cancel(&mut self) -> GameResult<Transition> {
        self.require_waiting()?;
        self.state = SessionState::Cancelled;

        let mut events = Vec::new();
        self.announce(&mut events, Outbound::public(GameEvent::GameCancelled));
        Ok(Transition::new(events, TimerDirective::Stop))
    }

    // ========== Day ==========

    /// Cast a Day ballot. The last living voter triggers resolution.
    pub fn day_vote(&mut self, voter: &str, choice: DayChoice) -> GameResult<Transition> {
        self.require_phase(Phase::Day)?;
        self.living_actor(voter)?;
        if self.day_votes.has(voter) {
            return Err(GameError::AlreadyActed(voter.to_string()));
        }
        if let DayChoice::Target(target) = &choice {
            self.living_target(target)?;
        }

        self.day_votes.record(voter, choice.clone())?;

        let mut events = Vec::new();
        self.announce(
            &mut events,
            Outbound::public(GameEvent::VoteCast {
                voter: voter.to_string(),
                choice,
            }),
        );

        let timer = if self.day_votes.len() >= self.roster.living_count(None) {
            self.resolve_day(&mut events)?
        } else {
            TimerDirective::Keep
        };
        Ok(Transition::new(events, timer))
    }

    fn resolve_day(&mut self, events: &mut Vec<Outbound>) -> GameResult<TimerDirective> {
        let outcome = consensus::resolve(self.day_votes.all().values().filter_map(|c| c.target()));

        match outcome {
            Consensus::Chosen { target, votes } => {
                if self.roster.eliminate(&target)? {
                    tracing::info!(code = %self.code, %target, votes, "Eliminated by vote");
                    self.announce(
                        events,
                        Outbound::public(GameEvent::PlayerEliminated {
                            target,
                            reason: EliminationReason::Vote,
                            vote_count: Some(votes),
                        }),
                    );
                }
            }
            Consensus::Tie { mut targets, .. } => {
                targets.sort_by_key(|id| self.roster.position(id));
                self.announce(
                    events,
                    Outbound::public(GameEvent::VoteTie {
                        tied_targets: targets,
                    }),
                );
            }
            Consensus::NoVotes => {
                self.announce(events, Outbound::public(GameEvent::NoElimination));
            }
        }

        self.day_votes.clear();
        Ok(self.conclude_phase(events, Phase::Night))
    }

    // ========== Night ==========

    pub fn night_action(
        &mut self,
        actor: &str,
        target: &str,
        kind: NightActionKind,
    ) -> GameResult<Transition> {
        self.require_phase(Phase::Night)?;
        let actor_p = self.living_actor(actor)?;
        let rules = actor_p.role.rules();
        if rules.action != Some(kind) {
            return Err(GameError::InvalidActor(format!(
                "{:?} cannot perform {:?}",
                actor_p.role, kind
            )));
        }

        let target_p = self.living_target(target)?;
        if actor == target {
            if !rules.may_target_self {
                return Err(GameError::InvalidTarget(format!(
                    "{:?} cannot target themselves",
                    rules.role
                )));
            }
        } else if !rules.may_target_faction && target_p.role.faction() == rules.faction {
            return Err(GameError::InvalidTarget(format!(
                "{} is on your own side",
                target_p.username
            )));
        }
        let target_is_mafia = target_p.role == Role::Mafia;

        match rules.duty {
            NightDuty::Team if self.mafia_consensus_closed => {
                return Err(GameError::AlreadyActed(actor.to_string()));
            }
            NightDuty::Individual if self.acted_this_night.contains(actor) => {
                return Err(GameError::AlreadyActed(actor.to_string()));
            }
            _ => {}
        }

        let mut events = Vec::new();
        match kind {
            NightActionKind::Kill => self.record_mafia_vote(actor, target, &mut events),
            NightActionKind::Shield => {
                self.pending_night_shield = Some(target.to_string());
                self.acted_this_night.insert(actor.to_string());
                self.announce(
                    &mut events,
                    Outbound::to(
                        Audience::only(&actor.to_string()),
                        GameEvent::ShieldRecorded {
                            target: target.to_string(),
                        },
                    ),
                );
            }
            NightActionKind::Investigate => {
                self.roster.get_mut(target)?.investigated = true;
                self.acted_this_night.insert(actor.to_string());
                self.announce(
                    &mut events,
                    Outbound::to(
                        Audience::only(&actor.to_string()),
                        GameEvent::InvestigationResult {
                            target: target.to_string(),
                            is_mafia: target_is_mafia,
                        },
                    ),
                );
            }
        }
        tracing::debug!(code = %self.code, actor, ?kind, "Night action recorded");

        let timer = if self.night_complete() {
            self.resolve_night(&mut events)?
        } else {
            TimerDirective::Keep
        };
        Ok(Transition::new(events, timer))
    }

    /// Record or revise a Mafia vote and close the consensus once everyone
    /// agrees on a single target
    fn record_mafia_vote(&mut self, voter: &str, target: &str, events: &mut Vec<Outbound>) {
        self.mafia_votes.replace(voter, target.to_string());

        let mafia = self.roster.ids_with_role(Role::Mafia);
        let cast = mafia.iter().filter(|id| self.mafia_votes.has(id)).count();

        if cast < mafia.len() {
            self.announce(
                events,
                Outbound::to(
                    Audience::only(&voter.to_string()),
                    GameEvent::MafiaVoteRecorded {
                        target: target.to_string(),
                        votes_remaining: mafia.len() - cast,
                    },
                ),
            );
            let others: Vec<ParticipantId> =
                mafia.iter().filter(|id| *id != voter).cloned().collect();
            if !others.is_empty() {
                self.announce(
                    events,
                    Outbound::to(
                        Audience::Participants(others),
                        GameEvent::MafiaTeammateVoted {
                            voter: voter.to_string(),
                            target: target.to_string(),
                        },
                    ),
                );
            }
            return;
        }

        match self.mafia_consensus(&mafia) {
            Consensus::Chosen { target, .. } => {
                self.pending_night_kill = Some(target.clone());
                self.mafia_consensus_closed = true;
                self.announce(
                    events,
                    Outbound::to(
                        Audience::Participants(mafia),
                        GameEvent::MafiaTargetChosen { target },
                    ),
                );
            }
            Consensus::Tie { mut targets, .. } => {
                targets.sort_by_key(|id| self.roster.position(id));
                self.announce(
                    events,
                    Outbound::to(
                        Audience::Participants(mafia),
                        GameEvent::MafiaVoteTie {
                            tied_targets: targets,
                        },
                    ),
                );
            }
            Consensus::NoVotes => {}
        }
    }

    /// Plurality over the votes of currently living Mafia
    fn mafia_consensus(&self, mafia: &[ParticipantId]) -> Consensus {
        consensus::resolve(mafia.iter().filter_map(|id| self.mafia_votes.get(id)))
    }

    /// Every living role with a night duty has done it
    pub fn night_complete(&self) -> bool {
        self.roster.living().all(|p| match p.role.rules().duty {
            NightDuty::None => true,
            NightDuty::Individual => self.acted_this_night.contains(&p.id),
            NightDuty::Team => self.mafia_consensus_closed,
        })
    }

    fn resolve_night(&mut self, events: &mut Vec<Outbound>) -> GameResult<TimerDirective> {
        let outcome = night::resolve(
            &mut self.roster,
            self.pending_night_kill.as_ref(),
            self.pending_night_shield.as_ref(),
        )?;

        match outcome {
            NightOutcome::NoKill => {
                self.announce(events, Outbound::public(GameEvent::NoDeathsLastNight));
            }
            NightOutcome::Saved { .. } => {
                self.announce(events, Outbound::public(GameEvent::SomeoneWasSaved));
                self.announce(events, Outbound::public(GameEvent::NoDeathsLastNight));
            }
            NightOutcome::Killed {
                target,
                announce: true,
            } => {
                tracing::info!(code = %self.code, %target, "Killed during the night");
                self.announce(
                    events,
                    Outbound::public(GameEvent::PlayerDiedLastNight { target }),
                );
            }
            NightOutcome::Killed {
                announce: false, ..
            } => {
                self.announce(events, Outbound::public(GameEvent::NoDeathsLastNight));
            }
        }

        self.mafia_votes.clear();
        self.acted_this_night.clear();
        self.mafia_consensus_closed = false;
        self.pending_night_kill = None;
        self.pending_night_shield = None;

        Ok(self.conclude_phase(events, Phase::Day))
    }

    /// Run the win check after a resolution and either end the game or open
    /// the next phase
    fn conclude_phase(&mut self, events: &mut Vec<Outbound>, next: Phase) -> TimerDirective {
        match win::evaluate(&self.roster) {
            Verdict::Winner(winner) => {
                self.state = SessionState::Finished;
                self.winner = Some(winner);
                tracing::info!(code = %self.code, ?winner, day = self.day, "Game finished");
                self.announce(events, Outbound::public(GameEvent::GameEnded { winner }));
                TimerDirective::Stop
            }
            Verdict::Continue => {
                if next == Phase::Day {
                    self.day += 1;
                }
                self.phase = next;
                tracing::info!(code = %self.code, phase = ?next, day = self.day, "Phase changed");
                self.announce(
                    events,
                    Outbound::public(GameEvent::PhaseChanged {
                        phase: next,
                        day: self.day,
                    }),
                );
                TimerDirective::Start {
                    phase: next,
                    day: self.day,
                }
            }
        }
    }

    // ========== Clock ==========

    /// Force the end of the current phase, treating missing actions as absent
    pub fn clock_elapsed(&mut self) -> GameResult<Transition> {
        if self.state != SessionState::InProgress {
            return Err(GameError::InvalidPhase(
                "No phase is running".to_string(),
            ));
        }

        let mut events = Vec::new();
        let timer = match self.phase {
            Phase::Day => self.resolve_day(&mut events)?,
            Phase::Night => {
                if !self.mafia_consensus_closed {
                    let mafia = self.roster.ids_with_role(Role::Mafia);
                    self.pending_night_kill = self.mafia_consensus(&mafia).chosen().cloned();
                }
                self.resolve_night(&mut events)?
            }
        };
        Ok(Transition::new(events, timer))
    }

    // ========== Read-only views ==========

    /// Snapshot with roles hidden from everyone who may not know them
    pub fn view_for(&self, viewer: Option<&str>) -> SessionView {
        let finished = self.state == SessionState::Finished;
        let viewer_is_mafia = viewer
            .and_then(|v| self.roster.get(v).ok())
            .is_some_and(|p| p.role == Role::Mafia && self.state != SessionState::WaitingForPlayers);
        let voting = self.state == SessionState::InProgress && self.phase == Phase::Day;

        let participants = self
            .roster
            .iter()
            .map(|p| {
                let is_viewer = viewer == Some(p.id.as_str());
                let visible = finished
                    || (self.state == SessionState::InProgress
                        && (is_viewer || (viewer_is_mafia && p.role == Role::Mafia)));
                ParticipantView {
                    id: p.id.clone(),
                    username: p.username.clone(),
                    alive: p.alive,
                    role: visible.then_some(p.role),
                    has_voted: voting && self.day_votes.has(&p.id),
                }
            })
            .collect();

        SessionView {
            code: self.code.clone(),
            state: self.state,
            phase: self.phase,
            day: self.day,
            winner: self.winner,
            participants,
            votes_cast: if voting { self.day_votes.len() } else { 0 },
        }
    }

    /// Public allow-list while running, the full trail once finished
    pub fn visible_history(&self) -> Vec<HistoryEntry> {
        if self.state == SessionState::Finished {
            self.history.all_entries()
        } else {
            self.history.public_entries()
        }
    }
}
