//! JSON snapshots of the in-memory store
//!
//! The server loads a snapshot on startup and writes one on shutdown. Writes
//! go to a temporary file first and are renamed into place.

use std::path::Path;

use tracing::{debug, info};

use crate::{
    error::PersistenceResult,
    memory::{InMemoryStore, StoreState},
};

/// Load a store from `path`, or an empty store when the file does not exist
pub fn load_store(path: impl AsRef<Path>) -> PersistenceResult<InMemoryStore> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(path = %path.display(), "No snapshot found, starting empty");
        return Ok(InMemoryStore::new());
    }
    let content = std::fs::read_to_string(path)?;
    let state: StoreState = serde_json::from_str(&content)?;
    info!(path = %path.display(), counts = ?state.counts(), "Loaded snapshot");
    Ok(InMemoryStore::with_state(state))
}

/// Write the store to `path` atomically
pub fn save_store(store: &InMemoryStore, path: impl AsRef<Path>) -> PersistenceResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(&store.state())?;
    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;

    info!(path = %path.display(), "Saved snapshot");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_snapshot_gives_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = load_store(dir.path().join("none.json")).unwrap();
        assert!(store.counts().values().all(|n| *n == 0));
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_store(&path).is_err());
    }
}
