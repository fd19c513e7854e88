use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use thiserror::Error;

/// Errors produced by key/value store implementations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Requested key does not exist.
    #[error("entry not found for key: {key}")]
    NotFound { key: String },
    /// Underlying storage failure.
    #[error("storage failure: {reason}")]
    Storage { reason: String },
}

/// Best-effort local persistence: each key holds one independently saved
/// JSON document (tasks, preferences).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Persist a value under a key, overwriting any existing entry.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Retrieve the value for a key.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Remove a key and its value (idempotent).
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Process-local store for tests and dry runs. Clones share the same map.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    inner: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `put` calls seen so far, across all keys.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut map = self.inner.lock().map_err(|err| StoreError::Storage {
            reason: format!("lock poisoned: {err}"),
        })?;
        map.insert(key.to_string(), value.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let map = self.inner.lock().map_err(|err| StoreError::Storage {
            reason: format!("lock poisoned: {err}"),
        })?;

        map.get(key).cloned().ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self.inner.lock().map_err(|err| StoreError::Storage {
            reason: format!("lock poisoned: {err}"),
        })?;
        map.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip_and_overwrite() {
        let store = InMemoryStore::new();
        store.put("tasks", b"[]").await.expect("put should succeed");
        store.put("tasks", b"[1]").await.expect("overwrite should succeed");

        let retrieved = store.get("tasks").await.expect("get should succeed");
        assert_eq!(retrieved, b"[1]");
        assert_eq!(store.writes(), 2);
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_removes_data() {
        let store = InMemoryStore::new();
        store.put("k", b"v").await.expect("put should succeed");
        store.delete("k").await.expect("delete should succeed");
        store
            .delete("k")
            .await
            .expect("delete again should still succeed");

        let err = store
            .get("k")
            .await
            .expect_err("get should fail after delete");
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
