//! Session persistence.
//!
//! The session actor saves every committed transition before publishing it,
//! so whatever a store returns from `load` is a state clients have seen.

use crate::error::{StoreError, StoreResult};
use crate::game::setup::is_valid_code;
use crate::game::Session;
use crate::types::SessionCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Schema version for stored snapshots
/// Version 1: initial format
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// What lands on disk for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub schema_version: u32,
    /// ISO8601 timestamp
    pub saved_at: String,
    pub session: Session,
}

impl SessionSnapshot {
    pub fn new(session: Session) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            saved_at: chrono::Utc::now().to_rfc3339(),
            session,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version > SNAPSHOT_SCHEMA_VERSION {
            return Err(format!(
                "Snapshot schema version {} is newer than supported version {}",
                self.schema_version, SNAPSHOT_SCHEMA_VERSION
            ));
        }
        Ok(())
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, code: &str) -> StoreResult<Option<Session>>;
    async fn save(&self, session: &Session) -> StoreResult<()>;
    async fn exists(&self, code: &str) -> StoreResult<bool>;
}

/// Keeps snapshots in process memory; used when no data directory is set
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<SessionCode, Session>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, code: &str) -> StoreResult<Option<Session>> {
        Ok(self.sessions.read().await.get(code).cloned())
    }

    async fn save(&self, session: &Session) -> StoreResult<()> {
        self.sessions
            .write()
            .await
            .insert(session.code.clone(), session.clone());
        Ok(())
    }

    async fn exists(&self, code: &str) -> StoreResult<bool> {
        Ok(self.sessions.read().await.contains_key(code))
    }
}

/// One `<code>.json` file per session
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (and create if needed) the data directory
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        tracing::info!("Session store at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File for a session. Anything that is not a well-formed code has none,
    /// so client input never escapes the data directory.
    fn path_for(&self, code: &str) -> Option<PathBuf> {
        is_valid_code(code).then(|| self.dir.join(format!("{}.json", code)))
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn load(&self, code: &str) -> StoreResult<Option<Session>> {
        let Some(path) = self.path_for(code) else {
            return Ok(None);
        };
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot: SessionSnapshot = serde_json::from_slice(&bytes)?;
        snapshot.validate().map_err(StoreError::Incompatible)?;
        Ok(Some(snapshot.session))
    }

    async fn save(&self, session: &Session) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(&SessionSnapshot::new(session.clone()))?;
        let path = self
            .path_for(&session.code)
            .ok_or_else(|| StoreError::InvalidCode(session.code.clone()))?;
        let tmp = path.with_extension("json.tmp");

        // Write then rename so readers never see a half-written file
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn exists(&self, code: &str) -> StoreResult<bool> {
        match self.path_for(code) {
            Some(path) => Ok(tokio::fs::try_exists(path).await?),
            None => Ok(false),
        }
    }
}
