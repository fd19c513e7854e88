use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use cadence_core::{
    preferences::UserPreferences,
    storage::{KeyValueStore, StoreError},
    tasks::{Task, TaskRepository},
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{instrument, warn};

const TASKS_KEY: &str = "tasks";
const PREFERENCES_KEY: &str = "preferences";

/// Task repository backed by a `KeyValueStore`, one JSON document per key.
pub struct KvTaskRepo<S: KeyValueStore> {
    store: Arc<S>,
}

impl<S: KeyValueStore> KvTaskRepo<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Missing or unreadable documents load as the default value; a corrupt
    /// document is copied aside before it gets overwritten by the next save.
    async fn load<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        let bytes = match self.store.get(key).await {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound { .. }) => return Ok(T::default()),
            Err(err) => return Err(anyhow::anyhow!(err.to_string())),
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(key, error = %err, "stored state is unreadable, starting empty");
                let backup = format!("{key}.corrupt");
                if let Err(err) = self.store.put(&backup, &bytes).await {
                    warn!(key = %backup, error = %err, "could not keep a copy of unreadable state");
                }
                Ok(T::default())
            }
        }
    }

    async fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.store
            .put(key, &bytes)
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))
    }
}

#[async_trait]
impl<S: KeyValueStore> TaskRepository for KvTaskRepo<S> {
    #[instrument(skip(self))]
    async fn load_tasks(&self) -> Result<Vec<Task>> {
        self.load(TASKS_KEY).await
    }

    #[instrument(skip_all, fields(count = tasks.len()))]
    async fn save_tasks(&self, tasks: &[Task]) -> Result<()> {
        self.save(TASKS_KEY, tasks).await
    }

    #[instrument(skip(self))]
    async fn load_preferences(&self) -> Result<UserPreferences> {
        self.load(PREFERENCES_KEY).await
    }

    #[instrument(skip_all)]
    async fn save_preferences(&self, preferences: &UserPreferences) -> Result<()> {
        self.save(PREFERENCES_KEY, preferences).await
    }
}
