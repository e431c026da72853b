//! One task per session.
//!
//! The actor is the only code that ever touches its `Session`. Commands arrive
//! over an mpsc queue, so votes from different connections and the phase
//! clock are applied strictly one after another.

use crate::clock::{ClockElapsed, PhaseClock};
use crate::error::{GameError, GameResult};
use crate::game::history::HistoryEntry;
use crate::game::{Session, SessionStatus, SessionView, TimerDirective, Transition};
use crate::protocol::Envelope;
use crate::store::SessionStore;
use crate::types::*;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

const COMMAND_BUFFER: usize = 64;

type Reply<T> = oneshot::Sender<GameResult<T>>;

pub(crate) enum Command {
    Join {
        username: String,
        reply: Reply<Participant>,
    },
    Start {
        reply: Reply<()>,
    },
    Cancel {
        reply: Reply<()>,
    },
    DayVote {
        voter: ParticipantId,
        choice: DayChoice,
        reply: Reply<()>,
    },
    NightAction {
        actor: ParticipantId,
        target: ParticipantId,
        kind: NightActionKind,
        reply: Reply<()>,
    },
    /// Forced end of phase requested from outside
    ForceElapse {
        reply: Reply<()>,
    },
    /// Deadline from this session's own clock
    ClockElapsed(ClockElapsed),
    View {
        viewer: Option<ParticipantId>,
        reply: oneshot::Sender<SessionView>,
    },
    History {
        reply: oneshot::Sender<Vec<HistoryEntry>>,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
}

impl From<ClockElapsed> for Command {
    fn from(elapsed: ClockElapsed) -> Self {
        Command::ClockElapsed(elapsed)
    }
}

/// Cheap, cloneable address of a running session actor
#[derive(Clone)]
pub struct SessionHandle {
    code: SessionCode,
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> GameResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| GameError::SessionClosed(self.code.clone()))?;
        rx.await
            .map_err(|_| GameError::SessionClosed(self.code.clone()))
    }

    pub async fn join(&self, username: String) -> GameResult<Participant> {
        self.request(|reply| Command::Join { username, reply })
            .await?
    }

    pub async fn start(&self) -> GameResult<()> {
        self.request(|reply| Command::Start { reply }).await?
    }

    pub async fn cancel(&self) -> GameResult<()> {
        self.request(|reply| Command::Cancel { reply }).await?
    }

    pub async fn day_vote(&self, voter: ParticipantId, choice: DayChoice) -> GameResult<()> {
        self.request(|reply| Command::DayVote {
            voter,
            choice,
            reply,
        })
        .await?
    }

    pub async fn night_action(
        &self,
        actor: ParticipantId,
        target: ParticipantId,
        kind: NightActionKind,
    ) -> GameResult<()> {
        self.request(|reply| Command::NightAction {
            actor,
            target,
            kind,
            reply,
        })
        .await?
    }

    pub async fn force_elapse(&self) -> GameResult<()> {
        self.request(|reply| Command::ForceElapse { reply }).await?
    }

    pub async fn view(&self, viewer: Option<ParticipantId>) -> GameResult<SessionView> {
        self.request(|reply| Command::View { viewer, reply }).await
    }

    pub async fn history(&self) -> GameResult<Vec<HistoryEntry>> {
        self.request(|reply| Command::History { reply }).await
    }

    pub async fn status(&self) -> GameResult<SessionStatus> {
        self.request(|reply| Command::Status { reply }).await
    }

    #[cfg(test)]
    pub(crate) async fn send_raw(&self, command: Command) {
        let _ = self.tx.send(command).await;
    }
}

struct SessionActor {
    session: Session,
    store: Arc<dyn SessionStore>,
    events: broadcast::Sender<Envelope>,
    clock: PhaseClock<Command>,
    rx: mpsc::Receiver<Command>,
}

/// Start the actor for `session` and return its handle.
///
/// A session that is already running gets its phase timer re-armed, so a
/// session restored from the store keeps moving.
pub fn spawn(
    session: Session,
    store: Arc<dyn SessionStore>,
    events: broadcast::Sender<Envelope>,
    config: GameConfig,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let mut clock = PhaseClock::new(config, tx.downgrade());
    if session.state == SessionState::InProgress {
        clock.start(session.phase, session.day);
    }

    let code = session.code.clone();
    let actor = SessionActor {
        session,
        store,
        events,
        clock,
        rx,
    };
    tokio::spawn(actor.run());

    SessionHandle { code, tx }
}

impl SessionActor {
    async fn run(mut self) {
        tracing::debug!(code = %self.session.code, "Session actor started");
        while let Some(command) = self.rx.recv().await {
            self.handle(command).await;
        }
        tracing::debug!(code = %self.session.code, "Session actor stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Join { username, reply } => {
                let result = self.commit(|s| s.join(&username)).await;
                let _ = reply.send(result);
            }
            Command::Start { reply } => {
                let result = self
                    .commit(|s| {
                        let mut rng = rand::rng();
                        s.start(&mut rng).map(|t| ((), t))
                    })
                    .await;
                let _ = reply.send(result);
            }
            Command::Cancel { reply } => {
                let result = self.commit(|s| s.cancel().map(|t| ((), t))).await;
                let _ = reply.send(result);
            }
            Command::DayVote {
                voter,
                choice,
                reply,
            } => {
                let result = self
                    .commit(|s| s.day_vote(&voter, choice).map(|t| ((), t)))
                    .await;
                let _ = reply.send(result);
            }
            Command::NightAction {
                actor,
                target,
                kind,
                reply,
            } => {
                let result = self
                    .commit(|s| s.night_action(&actor, &target, kind).map(|t| ((), t)))
                    .await;
                let _ = reply.send(result);
            }
            Command::ForceElapse { reply } => {
                let result = self.commit(|s| s.clock_elapsed().map(|t| ((), t))).await;
                let _ = reply.send(result);
            }
            Command::ClockElapsed(elapsed) => {
                if !self.session.is_current_epoch(elapsed.phase, elapsed.day) {
                    tracing::debug!(
                        code = %self.session.code,
                        phase = ?elapsed.phase,
                        day = elapsed.day,
                        "Ignoring stale phase deadline"
                    );
                    return;
                }
                tracing::info!(
                    code = %self.session.code,
                    phase = ?elapsed.phase,
                    day = elapsed.day,
                    "Phase deadline reached"
                );
                if let Err(e) = self.commit(|s| s.clock_elapsed().map(|t| ((), t))).await {
                    tracing::error!(code = %self.session.code, "Deadline resolution failed: {}", e);
                }
            }
            Command::View { viewer, reply } => {
                let _ = reply.send(self.session.view_for(viewer.as_deref()));
            }
            Command::History { reply } => {
                let _ = reply.send(self.session.visible_history());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.session.status());
            }
        }
    }

    /// Apply `op` to a copy of the session, persist the copy, then make it
    /// current and publish. A rejection or failed save leaves the committed
    /// session untouched.
    async fn commit<T>(
        &mut self,
        op: impl FnOnce(&mut Session) -> GameResult<(T, Transition)>,
    ) -> GameResult<T> {
        let mut next = self.session.clone();
        let (value, transition) = op(&mut next)?;
        next.touch();

        if let Err(e) = self.store.save(&next).await {
            tracing::error!(code = %next.code, "Failed to save session: {}", e);
            return Err(e.into());
        }
        self.session = next;

        match transition.timer {
            TimerDirective::Keep => {}
            TimerDirective::Start { phase, day } => self.clock.start(phase, day),
            TimerDirective::Stop => self.clock.stop(),
        }

        for outbound in transition.events {
            // No subscribers is fine
            let _ = self.events.send(Envelope {
                code: self.session.code.clone(),
                audience: outbound.audience,
                event: outbound.event,
            });
        }
        Ok(value)
    }
}
