//! Session-scoped key-value store holding the load fallback.
//!
//! The snapshot and its write time live under two keys that are always
//! written, read, and removed together.

use chrono::{DateTime, TimeZone, Utc};
use fieldgate_core::PermissionSnapshot;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Key holding the JSON-serialized snapshot.
pub const SNAPSHOT_KEY: &str = "ui_permissions";
/// Key holding the write time as epoch milliseconds.
pub const TIMESTAMP_KEY: &str = "ui_permissions_timestamp";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Corrupt entry for {key}: {reason}")]
    Corrupt { key: &'static str, reason: String },
    #[error("Invalid store key: {0:?}")]
    InvalidKey(String),
    #[error("Session store lock poisoned")]
    LockPoisoned,
}

/// Minimal string key-value store, in the shape of browser session storage.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

// ============================================================================
// IN-MEMORY
// ============================================================================

/// Process-local store; its contents end with the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::LockPoisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::LockPoisoned)?;
        entries.remove(key);
        Ok(())
    }
}

// ============================================================================
// FILE-BACKED
// ============================================================================

/// One file per key inside `dir`, so the fallback outlives a single CLI run.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(path, value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// SNAPSHOT ENTRIES
// ============================================================================

/// A snapshot as read back from the store, with its write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSnapshot {
    pub snapshot: PermissionSnapshot,
    pub written_at: DateTime<Utc>,
}

/// Write the snapshot and its timestamp.
pub fn persist_snapshot(
    store: &dyn SessionStore,
    snapshot: &PermissionSnapshot,
    written_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    let encoded = serde_json::to_string(snapshot)?;
    store.set(SNAPSHOT_KEY, &encoded)?;
    store.set(TIMESTAMP_KEY, &written_at.timestamp_millis().to_string())?;
    Ok(())
}

/// Read the snapshot back. `Ok(None)` unless both keys are present.
pub fn load_snapshot(store: &dyn SessionStore) -> Result<Option<PersistedSnapshot>, StoreError> {
    let (Some(encoded), Some(timestamp)) = (store.get(SNAPSHOT_KEY)?, store.get(TIMESTAMP_KEY)?)
    else {
        return Ok(None);
    };

    let millis: i64 = timestamp.trim().parse().map_err(|e: std::num::ParseIntError| {
        StoreError::Corrupt {
            key: TIMESTAMP_KEY,
            reason: e.to_string(),
        }
    })?;
    let written_at = Utc
        .timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| StoreError::Corrupt {
            key: TIMESTAMP_KEY,
            reason: format!("timestamp {} out of range", millis),
        })?;
    let snapshot = serde_json::from_str::<PermissionSnapshot>(&encoded)?;

    Ok(Some(PersistedSnapshot {
        snapshot,
        written_at,
    }))
}

/// Remove both keys. Both removals are attempted; the first error wins.
pub fn remove_snapshot(store: &dyn SessionStore) -> Result<(), StoreError> {
    let snapshot = store.remove(SNAPSHOT_KEY);
    let timestamp = store.remove(TIMESTAMP_KEY);
    snapshot.and(timestamp)
}
