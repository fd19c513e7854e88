use std::path::PathBuf;

use cadence_core::clock::SystemClock;
use cadence_storage::json_file_store::JsonFileStore;
use cadence_task::{KvTaskRepo, TaskStore};
use color_eyre::Result;
use dirs::data_dir;
use tracing::debug;

use crate::config::Config;

pub type LocalTaskStore = TaskStore<KvTaskRepo<JsonFileStore>, SystemClock>;

/// Resolve the default data directory for Cadence.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("cadence"))
}

/// Build the file store, honoring a configured data directory.
pub fn store_from_config(config: &Config) -> Result<JsonFileStore> {
    let root = match &config.data_dir {
        Some(root) => root.clone(),
        None => default_data_dir()?,
    };
    debug!(?root, "initializing file store");
    Ok(JsonFileStore::new(root))
}

/// Load tasks and preferences from the configured store.
pub async fn open_task_store(config: &Config) -> Result<LocalTaskStore> {
    let repo = KvTaskRepo::new(store_from_config(config)?);
    TaskStore::open(repo, SystemClock)
        .await
        .map_err(|e| color_eyre::eyre::eyre!(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn configured_data_dir_is_used() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            data_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };

        let store = store_from_config(&config).expect("store");
        assert_eq!(store.root(), dir.path());

        let tasks = open_task_store(&config).await.expect("open");
        assert!(tasks.tasks().is_empty());
    }
}
