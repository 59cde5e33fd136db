//! Key-value storage the history is persisted into.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;

/// Storage failures.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StorageError {
    /// The value is bigger than the store allows.
    QuotaExceeded {
        /// Size of the rejected value in bytes.
        size: usize,
        /// Configured limit in bytes.
        quota: usize,
    },
    /// The backing store failed.
    Backend(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuotaExceeded { size, quota } => {
                write!(f, "Storage quota exceeded: {size} bytes over a {quota} byte limit")
            }
            Self::Backend(err) => write!(f, "Storage backend error: {err}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<sea_orm::DbErr> for StorageError {
    fn from(err: sea_orm::DbErr) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// String values under string keys. Writes to one key are last-one-wins.
pub trait KeyValueStore: Send + Sync {
    /// Reads a value.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Writes a value.
    fn set(&self, key: &str, value: &str)
    -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Deletes a value; missing keys are fine.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Checks a value against an optional quota.
pub fn check_quota(value: &str, quota: Option<usize>) -> Result<(), StorageError> {
    match quota {
        Some(quota) if value.len() > quota => Err(StorageError::QuotaExceeded {
            size: value.len(),
            quota,
        }),
        _ => Ok(()),
    }
}

/// In-memory store, cloneable handle onto shared entries.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
    quota: Option<usize>,
}

impl MemoryStore {
    /// Store without a size limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store rejecting values larger than `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota: Some(quota),
            ..Self::default()
        }
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        check_quota(value, self.quota)?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
