//! Pluggable key/value storage for pending authorization requests
//!
//! Abstracts the browser's persistent store behind an async trait so the
//! redirect handler can run against any durable or in-memory keyed store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;

/// Error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying store failed to read or write
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Keyed string storage used to stash state across the authorization
/// redirect.
///
/// All operations are async; the redirect handler awaits every write before
/// handing out the redirect URL.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the value stored under `key`. Removing a missing key is not an
    /// error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Remove every stored value.
    async fn clear(&self) -> Result<(), StorageError>;
}

/// In-memory [`StorageBackend`], the default for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.entries.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for storage.
    use super::*;

    #[tokio::test]
    async fn set_get_remove_round_trip() {
        let storage = InMemoryStorage::new();

        storage.set("key", "value").await.unwrap();
        assert_eq!(storage.get("key").await.unwrap().as_deref(), Some("value"));

        storage.remove("key").await.unwrap();
        assert_eq!(storage.get("key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn remove_missing_key_is_ok() {
        let storage = InMemoryStorage::new();
        assert!(storage.remove("absent").await.is_ok());
    }

    #[tokio::test]
    async fn clear_empties_the_store() {
        let storage = InMemoryStorage::new();
        storage.set("a", "1").await.unwrap();
        storage.set("b", "2").await.unwrap();

        storage.clear().await.unwrap();

        assert!(storage.is_empty());
    }
}
