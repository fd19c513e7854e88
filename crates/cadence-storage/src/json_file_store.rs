use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use cadence_core::storage::{KeyValueStore, StoreError};
use tempfile::NamedTempFile;
use tracing::instrument;

/// One file per key under `root`. Writes go through a temp file in the same
/// directory, so a crash mid-save leaves the previous document intact.
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize_key(key)))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    #[instrument(skip(self, value), fields(bytes = value.len()))]
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        write_atomic(&self.path_for(key), value)
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        fs::read(self.path_for(key)).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::NotFound {
                    key: key.to_string(),
                }
            } else {
                storage_err(err)
            }
        })
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(storage_err(err)),
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let parent = path.parent().ok_or_else(|| StoreError::Storage {
        reason: "invalid storage path".to_string(),
    })?;
    fs::create_dir_all(parent).map_err(storage_err)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(storage_err)?;
    tmp.write_all(bytes).map_err(storage_err)?;
    tmp.flush().map_err(storage_err)?;
    tmp.persist(path).map_err(|e| storage_err(e.error))?;
    Ok(())
}

// Keys may contain separators; encode them into a flat file name.
fn sanitize_key(key: &str) -> String {
    URL_SAFE_NO_PAD.encode(key)
}

fn storage_err<E: ToString>(err: E) -> StoreError {
    StoreError::Storage {
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_returns_the_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path());

        store.put("tasks", br#"[{"title":"a"}]"#).await.expect("put");
        store.put("tasks", b"[]").await.expect("overwrite");

        assert_eq!(store.get("tasks").await.expect("get"), b"[]");
        let on_disk = fs::read(store.path_for("tasks")).expect("read file");
        assert_eq!(on_disk, b"[]");
    }

    #[tokio::test]
    async fn creates_missing_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path().join("nested").join("data"));

        store.put("preferences", b"{}").await.expect("put");
        assert!(store.root().is_dir());
    }

    #[tokio::test]
    async fn keys_with_separators_stay_inside_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path());

        store.put("../escape/key", b"{}").await.expect("put");
        let path = store.path_for("../escape/key");
        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(store.get("../escape/key").await.expect("get"), b"{}");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path());
        store.put("k", b"v").await.expect("put");
        store.delete("k").await.expect("delete");
        store.delete("k").await.expect("delete again");

        let err = store.get("k").await.expect_err("should be missing");
        assert_eq!(err, StoreError::NotFound { key: "k".into() });
    }
}
