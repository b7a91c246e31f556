//! Session snapshot of the theme cache
//!
//! Provides a `SessionCache` that saves the whole `ThemeStore` as one JSON
//! object and restores it at start-up, dropping expired entries. Persistence
//! is best effort: every failure is logged and swallowed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::store::{CacheEntry, ThemeStore};
use crate::theme::ThemeKey;

/// Well-known storage key, distinct from any other cached data
pub const SESSION_STORAGE_KEY: &str = "lyrix-theme-cache";

/// Errors from reading or writing a snapshot
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("session snapshot could not be encoded: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One persisted entry, in the layout the web client used
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SnapshotEntry {
    /// The cached theme text
    theme: String,
    /// When the entry was cached
    #[serde(with = "chrono::serde::ts_milliseconds")]
    timestamp: DateTime<Utc>,
    /// When the entry expires
    #[serde(with = "chrono::serde::ts_milliseconds")]
    expires: DateTime<Utc>,
}

/// A single session-scoped storage slot
pub trait SessionStorage: Send + Sync {
    /// Returns the stored snapshot, or `None` if nothing has been stored
    fn read(&self) -> Result<Option<String>, PersistenceError>;

    fn write(&self, contents: &str) -> Result<(), PersistenceError>;

    fn remove(&self) -> Result<(), PersistenceError>;
}

/// Stores the snapshot as a JSON file in a cache directory
///
/// Uses `~/.cache/lyrix/` on Linux, or the equivalent XDG path elsewhere.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Creates storage in the XDG cache directory
    ///
    /// Returns `None` if the directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "lyrix")?;
        Some(Self::with_dir(project_dirs.cache_dir().to_path_buf()))
    }

    /// Creates storage in a specific directory
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Path of the snapshot file
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", SESSION_STORAGE_KEY))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SessionStorage for FileStorage {
    fn read(&self) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(self.path()) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, contents: &str) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path(), contents)?;
        Ok(())
    }

    fn remove(&self) -> Result<(), PersistenceError> {
        match fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keeps the snapshot in process memory; cloned handles share the slot
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current raw contents of the slot
    pub fn contents(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SessionStorage for MemoryStorage {
    fn read(&self) -> Result<Option<String>, PersistenceError> {
        Ok(self.contents())
    }

    fn write(&self, contents: &str) -> Result<(), PersistenceError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(contents.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<(), PersistenceError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Loads and saves `ThemeStore` snapshots through a `SessionStorage`
#[derive(Clone)]
pub struct SessionCache {
    storage: Arc<dyn SessionStorage>,
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache").finish_non_exhaustive()
    }
}

impl SessionCache {
    pub fn new(storage: impl SessionStorage + 'static) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }

    /// Restores the store saved by an earlier run
    ///
    /// Missing, unreadable or corrupt snapshots behave as an empty cache.
    /// Expired entries and unrecognized keys are dropped.
    pub fn load(&self, now: DateTime<Utc>) -> ThemeStore {
        let raw = match self.storage.read() {
            Ok(Some(raw)) => raw,
            Ok(None) => return ThemeStore::new(),
            Err(e) => {
                warn!(error = %e, "failed to read theme cache snapshot");
                return ThemeStore::new();
            }
        };

        let snapshot: BTreeMap<String, SnapshotEntry> = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "ignoring corrupt theme cache snapshot");
                return ThemeStore::new();
            }
        };

        let total = snapshot.len();
        let entries = snapshot.into_iter().filter_map(|(raw_key, entry)| {
            let Some(key) = ThemeKey::parse(&raw_key) else {
                debug!(key = %raw_key, "dropping snapshot entry with unrecognized key");
                return None;
            };
            Some((
                key,
                CacheEntry {
                    value: entry.theme,
                    created_at: entry.timestamp,
                    expires_at: entry.expires,
                },
            ))
        });
        let store = ThemeStore::from_entries(entries, now);

        info!(
            restored = store.len(),
            dropped = total - store.len(),
            "loaded theme cache snapshot"
        );
        store
    }

    /// Writes the full contents of `store`, logging any failure
    pub fn save(&self, store: &ThemeStore) {
        if let Err(e) = self.try_save(store) {
            warn!(error = %e, "failed to save theme cache snapshot");
        }
    }

    fn try_save(&self, store: &ThemeStore) -> Result<(), PersistenceError> {
        let snapshot: BTreeMap<String, SnapshotEntry> = store
            .entries()
            .map(|(key, entry)| {
                (
                    key.to_string(),
                    SnapshotEntry {
                        theme: entry.value.clone(),
                        timestamp: entry.created_at,
                        expires: entry.expires_at,
                    },
                )
            })
            .collect();

        let json = serde_json::to_string(&snapshot)?;
        self.storage.write(&json)
    }

    /// Removes the stored snapshot, logging any failure
    pub fn clear(&self) {
        if let Err(e) = self.storage.remove() {
            warn!(error = %e, "failed to remove theme cache snapshot");
        }
    }
}
