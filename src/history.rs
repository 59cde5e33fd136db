//! Bounded history of finished photo shoots, persisted as one JSON array.

use tracing::{debug, error, warn};

use crate::constants::{HISTORY_STORAGE_KEY, MAX_HISTORY_SESSIONS};
use crate::models::PhotoShootSession;
use crate::storage::{KeyValueStore, StorageError};

/// A history write that didn't make it to storage. The in-memory collection
/// already reflects the change.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PersistenceError {
    /// Serialising the collection failed.
    Serialize(String),
    /// The store refused the write.
    Storage(StorageError),
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialize(err) => write!(f, "Failed to serialize history: {err}"),
            Self::Storage(err) => write!(f, "Failed to save history: {err}"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<StorageError> for PersistenceError {
    fn from(err: StorageError) -> Self {
        PersistenceError::Storage(err)
    }
}

/// Newest-first list of at most [MAX_HISTORY_SESSIONS] sessions.
#[derive(Debug)]
pub struct HistoryStore<S> {
    store: S,
    sessions: Vec<PhotoShootSession>,
}

impl<S: KeyValueStore> HistoryStore<S> {
    /// Reads the persisted history. Missing or unreadable history starts
    /// empty; a corrupt value is also deleted.
    pub async fn load(store: S) -> Self {
        let sessions = match store.get(HISTORY_STORAGE_KEY).await {
            Ok(None) => Vec::new(),
            Ok(Some(raw)) => match serde_json::from_str::<Vec<PhotoShootSession>>(&raw) {
                Ok(mut sessions) => {
                    sessions.truncate(MAX_HISTORY_SESSIONS);
                    sessions
                }
                Err(err) => {
                    error!("Failed to parse stored history, discarding it: {}", err);
                    if let Err(err) = store.remove(HISTORY_STORAGE_KEY).await {
                        warn!("Failed to remove corrupt history: {}", err);
                    }
                    Vec::new()
                }
            },
            Err(err) => {
                error!("Failed to read stored history: {}", err);
                Vec::new()
            }
        };
        debug!(sessions = sessions.len(), "history loaded");
        Self { store, sessions }
    }

    /// Sessions, newest first.
    pub fn list(&self) -> &[PhotoShootSession] {
        &self.sessions
    }

    /// Looks up one session.
    pub fn get(&self, id: &str) -> Option<&PhotoShootSession> {
        self.sessions.iter().find(|session| session.id == id)
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True with no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Puts `session` in front, dropping the oldest past the limit.
    pub async fn add(&mut self, session: PhotoShootSession) -> Result<(), PersistenceError> {
        self.sessions.insert(0, session);
        self.sessions.truncate(MAX_HISTORY_SESSIONS);
        self.persist().await
    }

    /// Drops the session with `id`, if there is one.
    pub async fn remove(&mut self, id: &str) -> Result<(), PersistenceError> {
        self.sessions.retain(|session| session.id != id);
        self.persist().await
    }

    /// Drops everything.
    pub async fn clear(&mut self) -> Result<(), PersistenceError> {
        self.sessions.clear();
        self.persist().await
    }

    async fn persist(&self) -> Result<(), PersistenceError> {
        let raw = serde_json::to_string(&self.sessions)
            .map_err(|err| PersistenceError::Serialize(err.to_string()))?;
        self.store
            .set(HISTORY_STORAGE_KEY, &raw)
            .await
            .inspect_err(|err| error!("Failed to save history: {}", err))?;
        Ok(())
    }
}
