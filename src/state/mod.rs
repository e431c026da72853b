pub mod actor;

use crate::error::{GameError, GameResult};
use crate::game::history::HistoryEntry;
use crate::game::setup;
use crate::game::{Session, SessionView};
use crate::protocol::Envelope;
use crate::store::{MemoryStore, SessionStore};
use crate::types::*;
use actor::SessionHandle;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Give up allocating a session code after this many collisions in a row
const MAX_CODE_ATTEMPTS: usize = 32;

/// Events buffered per subscriber before a slow socket starts lagging
const EVENT_BUFFER: usize = 4096;

/// Shared application state: the registry of live sessions
#[derive(Clone)]
pub struct AppState {
    /// Running session actors keyed by code
    pub sessions: Arc<RwLock<HashMap<SessionCode, SessionHandle>>>,
    pub store: Arc<dyn SessionStore>,
    pub config: GameConfig,
    /// Every event of every session; subscribers filter by code and audience
    pub events: broadcast::Sender<Envelope>,
}

impl AppState {
    pub fn new(config: GameConfig, store: Arc<dyn SessionStore>) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_BUFFER);
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            store,
            config,
            events,
        }
    }

    pub fn in_memory(config: GameConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.events.subscribe()
    }

    fn spawn_actor(&self, session: Session) -> SessionHandle {
        actor::spawn(
            session,
            self.store.clone(),
            self.events.clone(),
            self.config.clone(),
        )
    }

    /// Create a new session waiting for players and return its code
    pub async fn create_session(&self, created_by: Option<String>) -> GameResult<SessionCode> {
        let mut sessions = self.sessions.write().await;

        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = {
                let mut rng = rand::rng();
                setup::generate_session_code(&mut rng)
            };
            if sessions.contains_key(&code) || self.store.exists(&code).await? {
                tracing::debug!("Session code collision on {}, retrying", code);
                continue;
            }

            let session = Session::new(code.clone(), created_by.clone(), self.config.rules);
            self.store.save(&session).await?;
            sessions.insert(code.clone(), self.spawn_actor(session));

            tracing::info!("Created session {}", code);
            return Ok(code);
        }

        Err(GameError::Storage(
            "Could not allocate a free session code".to_string(),
        ))
    }

    /// Handle for a session, restoring it from the store if it is not loaded
    async fn handle(&self, code: &str) -> GameResult<SessionHandle> {
        let code = setup::normalize_code(code);
        if !setup::is_valid_code(&code) {
            return Err(GameError::SessionNotFound(code));
        }

        if let Some(handle) = self.sessions.read().await.get(&code) {
            if !handle.is_closed() {
                return Ok(handle.clone());
            }
        }

        let mut sessions = self.sessions.write().await;
        // Someone else may have loaded it while we waited for the lock
        if let Some(handle) = sessions.get(&code) {
            if !handle.is_closed() {
                return Ok(handle.clone());
            }
        }

        let session = self
            .store
            .load(&code)
            .await?
            .ok_or_else(|| GameError::SessionNotFound(code.clone()))?;
        tracing::info!("Restored session {} ({:?})", code, session.state);

        let handle = self.spawn_actor(session);
        sessions.insert(code, handle.clone());
        Ok(handle)
    }

    pub async fn join(&self, code: &str, username: &str) -> GameResult<Participant> {
        self.handle(code).await?.join(username.to_string()).await
    }

    pub async fn start(&self, code: &str) -> GameResult<()> {
        self.handle(code).await?.start().await
    }

    pub async fn cancel(&self, code: &str) -> GameResult<()> {
        self.handle(code).await?.cancel().await
    }

    pub async fn day_vote(
        &self,
        code: &str,
        voter: &str,
        choice: DayChoice,
    ) -> GameResult<()> {
        self.handle(code)
            .await?
            .day_vote(voter.to_string(), choice)
            .await
    }

    pub async fn night_action(
        &self,
        code: &str,
        actor: &str,
        target: &str,
        kind: NightActionKind,
    ) -> GameResult<()> {
        self.handle(code)
            .await?
            .night_action(actor.to_string(), target.to_string(), kind)
            .await
    }

    /// Force the current phase to end as if its deadline had passed
    pub async fn clock_elapsed(&self, code: &str) -> GameResult<()> {
        self.handle(code).await?.force_elapse().await
    }

    pub async fn view(&self, code: &str, viewer: Option<&str>) -> GameResult<SessionView> {
        self.handle(code)
            .await?
            .view(viewer.map(str::to_string))
            .await
    }

    pub async fn history(&self, code: &str) -> GameResult<Vec<HistoryEntry>> {
        self.handle(code).await?.history().await
    }

    /// Drop a session from memory. It stays in the store and is restored on
    /// next access.
    pub async fn evict(&self, code: &str) -> bool {
        let removed = self.sessions.write().await.remove(code).is_some();
        if removed {
            tracing::info!("Evicted session {}", code);
        }
        removed
    }

    /// Evict finished and cancelled sessions, and lobbies idle for longer
    /// than the configured TTL. Returns how many were dropped.
    pub async fn reap_sessions(&self) -> usize {
        let handles: Vec<SessionHandle> = self.sessions.read().await.values().cloned().collect();
        let now = Utc::now();

        let mut reaped = 0;
        for handle in handles {
            let reapable = match handle.status().await {
                Ok(status) => status.is_reapable(now, self.config.lobby_idle_ttl),
                // Actor is gone; nothing worth keeping
                Err(_) => true,
            };
            if reapable && self.evict(handle.code()).await {
                reaped += 1;
            }
        }
        reaped
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockElapsed;
    use crate::error::{StoreError, StoreResult};
    use crate::protocol::{Audience, GameEvent};
    use crate::store::JsonFileStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Deadlines far enough out that only tests trigger them
    fn slow_config() -> GameConfig {
        GameConfig {
            day_duration: Duration::from_secs(3600),
            night_duration: Duration::from_secs(3600),
            ..GameConfig::default()
        }
    }

    async fn lobby(state: &AppState, players: usize) -> (SessionCode, Vec<Participant>) {
        let code = state.create_session(Some("host".to_string())).await.unwrap();
        let mut joined = Vec::new();
        for i in 0..players {
            joined.push(state.join(&code, &format!("player{}", i)).await.unwrap());
        }
        (code, joined)
    }

    fn drain(rx: &mut broadcast::Receiver<Envelope>) -> Vec<Envelope> {
        let mut out = Vec::new();
        while let Ok(env) = rx.try_recv() {
            out.push(env);
        }
        out
    }

    #[tokio::test]
    async fn test_create_and_join() {
        let state = AppState::in_memory(slow_config());
        let (code, players) = lobby(&state, 3).await;

        assert_eq!(code.len(), setup::CODE_LENGTH);
        let view = state.view(&code, None).await.unwrap();
        assert_eq!(view.state, SessionState::WaitingForPlayers);
        assert_eq!(view.participants.len(), 3);
        assert_eq!(view.participants[0].id, players[0].id);

        // Codes are case-insensitive on the way in
        assert!(state.view(&code.to_lowercase(), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let state = AppState::in_memory(slow_config());
        assert_eq!(
            state.join("ZZZZZZ", "x").await,
            Err(GameError::SessionNotFound("ZZZZZZ".to_string()))
        );
    }

    #[tokio::test]
    async fn test_malformed_codes_never_reach_the_store() {
        let root = tempfile::tempdir().unwrap();
        let outside = root.path().join("OUTSIDE");
        std::fs::create_dir_all(&outside).unwrap();
        let planted = Session::new("ABCDEF".to_string(), None, SessionRules::default());
        std::fs::write(
            outside.join("LEAK.json"),
            serde_json::to_vec(&crate::store::SessionSnapshot::new(planted)).unwrap(),
        )
        .unwrap();

        let store = Arc::new(JsonFileStore::open(root.path().join("data")).await.unwrap());
        let state = AppState::new(slow_config(), store);

        for code in ["../OUTSIDE/LEAK", "../outside/leak", "ABC", ""] {
            assert!(matches!(
                state.view(code, None).await,
                Err(GameError::SessionNotFound(_))
            ));
        }
        assert_eq!(state.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_start_publishes_private_roles() {
        let state = AppState::in_memory(slow_config());
        let (code, players) = lobby(&state, 5).await;
        let mut rx = state.subscribe();

        state.start(&code).await.unwrap();
        let events = drain(&mut rx);

        assert!(events.iter().all(|e| e.code == code));
        for p in &players {
            let mine: Vec<_> = events
                .iter()
                .filter(|e| matches!(e.event, GameEvent::RoleAssigned { .. }))
                .filter(|e| e.is_visible_to(&code, Some(&p.id)))
                .collect();
            assert_eq!(mine.len(), 1);
        }
        // An anonymous observer sees none of them
        assert!(events
            .iter()
            .filter(|e| e.is_visible_to(&code, None))
            .all(|e| e.audience == Audience::Public));

        let view = state.view(&code, None).await.unwrap();
        assert_eq!(view.phase, Phase::Night);
        assert_eq!(view.day, 1);
    }

    #[tokio::test]
    async fn test_concurrent_day_votes_resolve_once() {
        let state = AppState::in_memory(slow_config());
        let (code, players) = lobby(&state, 6).await;
        state.start(&code).await.unwrap();
        // Nobody acts at night, the deadline moves us to Day
        state.clock_elapsed(&code).await.unwrap();
        assert_eq!(state.view(&code, None).await.unwrap().phase, Phase::Day);

        let mut rx = state.subscribe();
        let target = players[0].id.clone();
        let tasks: Vec<_> = players
            .iter()
            .map(|p| {
                let state = state.clone();
                let code = code.clone();
                let voter = p.id.clone();
                let target = target.clone();
                tokio::spawn(async move {
                    state
                        .day_vote(&code, &voter, DayChoice::Target(target))
                        .await
                })
            })
            .collect();
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        let events = drain(&mut rx);
        let eliminations = events
            .iter()
            .filter(|e| matches!(e.event, GameEvent::PlayerEliminated { .. }))
            .count();
        let resolutions = events
            .iter()
            .filter(|e| {
                matches!(
                    e.event,
                    GameEvent::PhaseChanged { .. } | GameEvent::GameEnded { .. }
                )
            })
            .count();
        assert_eq!(eliminations, 1);
        assert_eq!(resolutions, 1);

        let view = state.view(&code, None).await.unwrap();
        assert!(!view.participants[0].alive);
    }

    #[tokio::test]
    async fn test_stale_deadline_is_ignored() {
        let state = AppState::in_memory(slow_config());
        let (code, _) = lobby(&state, 4).await;
        state.start(&code).await.unwrap();
        state.clock_elapsed(&code).await.unwrap();

        // A Night 1 deadline arriving after the phase already moved on
        let handle = state.handle(&code).await.unwrap();
        handle
            .send_raw(actor::Command::ClockElapsed(ClockElapsed {
                phase: Phase::Night,
                day: 1,
            }))
            .await;

        let view = state.view(&code, None).await.unwrap();
        assert_eq!(view.phase, Phase::Day);
        assert_eq!(view.day, 2);
    }

    #[tokio::test]
    async fn test_deadline_advances_phase() {
        let config = GameConfig {
            day_duration: Duration::from_secs(3600),
            night_duration: Duration::from_millis(30),
            ..GameConfig::default()
        };
        let state = AppState::in_memory(config);
        let (code, _) = lobby(&state, 4).await;
        let mut rx = state.subscribe();
        state.start(&code).await.unwrap();

        let day_started = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let env = rx.recv().await.unwrap();
                if env.event == (GameEvent::PhaseChanged { phase: Phase::Day, day: 2 }) {
                    break;
                }
            }
        })
        .await;
        assert!(day_started.is_ok());
    }

    #[tokio::test]
    async fn test_sessions_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let code = {
            let store = Arc::new(JsonFileStore::open(dir.path()).await.unwrap());
            let state = AppState::new(slow_config(), store);
            let (code, _) = lobby(&state, 4).await;
            state.start(&code).await.unwrap();
            code
        };

        let store = Arc::new(JsonFileStore::open(dir.path()).await.unwrap());
        let state = AppState::new(slow_config(), store);
        assert_eq!(state.session_count().await, 0);

        let view = state.view(&code, None).await.unwrap();
        assert_eq!(view.state, SessionState::InProgress);
        assert_eq!(view.phase, Phase::Night);
        assert_eq!(view.participants.len(), 4);
        assert_eq!(state.session_count().await, 1);
    }

    /// Store whose saves can be switched off
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        failing: AtomicBool,
    }

    #[async_trait]
    impl SessionStore for FlakyStore {
        async fn load(&self, code: &str) -> StoreResult<Option<Session>> {
            self.inner.load(code).await
        }

        async fn save(&self, session: &Session) -> StoreResult<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            self.inner.save(session).await
        }

        async fn exists(&self, code: &str) -> StoreResult<bool> {
            self.inner.exists(code).await
        }
    }

    #[tokio::test]
    async fn test_failed_save_does_not_commit() {
        let store = Arc::new(FlakyStore::default());
        let state = AppState::new(slow_config(), store.clone());
        let (code, _) = lobby(&state, 2).await;
        let mut rx = state.subscribe();

        store.failing.store(true, Ordering::SeqCst);
        let result = state.join(&code, "late").await;
        assert!(matches!(result, Err(GameError::Storage(_))));
        assert!(drain(&mut rx).is_empty());
        assert_eq!(state.view(&code, None).await.unwrap().participants.len(), 2);

        store.failing.store(false, Ordering::SeqCst);
        assert!(state.join(&code, "late").await.is_ok());
    }

    #[tokio::test]
    async fn test_reap_sessions_drops_finished_ones() {
        let state = AppState::in_memory(slow_config());
        let (cancelled, _) = lobby(&state, 1).await;
        let (open, _) = lobby(&state, 1).await;
        state.cancel(&cancelled).await.unwrap();

        assert_eq!(state.reap_sessions().await, 1);
        assert_eq!(state.session_count().await, 1);
        assert!(state.sessions.read().await.contains_key(&open));

        // Still readable from the store
        let view = state.view(&cancelled, None).await.unwrap();
        assert_eq!(view.state, SessionState::Cancelled);
    }

    #[tokio::test]
    async fn test_reap_sessions_drops_idle_lobbies() {
        let config = GameConfig {
            lobby_idle_ttl: Duration::from_millis(500),
            ..slow_config()
        };
        let state = AppState::in_memory(config);
        for _ in 0..20 {
            lobby(&state, 1).await;
        }
        let (running, _) = lobby(&state, 4).await;
        state.start(&running).await.unwrap();
        assert_eq!(state.reap_sessions().await, 0);

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(state.reap_sessions().await, 20);
        assert_eq!(state.session_count().await, 1);
        assert!(state.sessions.read().await.contains_key(&running));
    }

    #[tokio::test]
    async fn test_activity_keeps_a_lobby_loaded() {
        let config = GameConfig {
            lobby_idle_ttl: Duration::from_millis(1000),
            ..slow_config()
        };
        let state = AppState::in_memory(config);
        let (code, _) = lobby(&state, 1).await;

        tokio::time::sleep(Duration::from_millis(600)).await;
        state.join(&code, "latecomer").await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(state.reap_sessions().await, 0);

        // Reads are not activity
        state.view(&code, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(state.reap_sessions().await, 1);

        // Evicted lobbies come back from the store on demand
        let view = state.view(&code, None).await.unwrap();
        assert_eq!(view.participants.len(), 2);
    }

    #[tokio::test]
    async fn test_history_hides_private_events_until_finished() {
        let state = AppState::in_memory(slow_config());
        let (code, _) = lobby(&state, 5).await;
        state.start(&code).await.unwrap();

        let history = state.history(&code).await.unwrap();
        assert!(!history.is_empty());
        assert!(history
            .iter()
            .all(|e| !matches!(e.event, GameEvent::RoleAssigned { .. })));
    }
}
