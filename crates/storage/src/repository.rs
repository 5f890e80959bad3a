use async_trait::async_trait;
use learn_core::model::{Module, ProgressState};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("invalid progress key")]
    InvalidKey,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key under which a learner's progress is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgressKey(String);

impl ProgressKey {
    /// Build a key from a learner identifier.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidKey` if the identifier is blank.
    pub fn new(raw: impl Into<String>) -> Result<Self, StorageError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(StorageError::InvalidKey);
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persistence collaborator for learner progress.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch stored progress. `Ok(None)` means nothing was stored yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn load_progress(&self, key: &ProgressKey) -> Result<Option<ProgressState>, StorageError>;

    /// Store progress, replacing what was there. Repeating a save is harmless.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the state cannot be stored.
    async fn save_progress(&self, key: &ProgressKey, state: &ProgressState)
    -> Result<(), StorageError>;
}

/// Read-only source of the ordered curriculum modules.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Load all modules in display order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the content cannot be read or parsed.
    async fn modules(&self) -> Result<Vec<Module>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    progress: Arc<Mutex<HashMap<ProgressKey, ProgressState>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of learners with stored progress.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.len())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn load_progress(
        &self,
        key: &ProgressKey,
    ) -> Result<Option<ProgressState>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn save_progress(
        &self,
        key: &ProgressKey,
        state: &ProgressState,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.clone(), state.clone());
        Ok(())
    }
}

/// Progress backend behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
}
