//! In-memory TTL store for theme text
//!
//! Entries are keyed by `ThemeKey` and carry an absolute expiry. Expired
//! entries are never returned: reads purge them lazily and `sweep` removes
//! them in bulk.

use std::collections::HashMap;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::theme::ThemeKey;

/// Default lifetime of a cached theme
pub const DEFAULT_THEME_TTL: StdDuration = StdDuration::from_secs(30 * 60);

/// Errors raised by the store itself
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// TTL was zero or too large to represent as a timestamp offset
    #[error("TTL must be a positive duration, got {0:?}")]
    InvalidTtl(StdDuration),
}

/// A cached theme and its lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The theme text
    pub value: String,
    /// When the entry was inserted
    pub created_at: DateTime<Utc>,
    /// When the entry stops being valid
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Whether the entry is still valid at `now`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Key/value map with per-entry expiry
#[derive(Debug, Clone, Default)]
pub struct ThemeStore {
    entries: HashMap<ThemeKey, CacheEntry>,
}

impl ThemeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from previously persisted entries, dropping any that
    /// are already expired or malformed at `now`
    pub fn from_entries<I>(entries: I, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = (ThemeKey, CacheEntry)>,
    {
        let entries = entries
            .into_iter()
            .filter(|(_, entry)| entry.expires_at > entry.created_at && entry.is_fresh(now))
            .collect();
        Self { entries }
    }

    /// Returns the fresh value for `key`, purging it if it has expired
    pub fn get(&mut self, key: &ThemeKey) -> Option<String> {
        self.get_at(key, Utc::now())
    }

    /// Clock-explicit form of `get`
    pub fn get_at(&mut self, key: &ThemeKey, now: DateTime<Utc>) -> Option<String> {
        match self.entries.get(key) {
            Some(entry) if entry.is_fresh(now) => Some(entry.value.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Stores `value` under `key` for `ttl`, replacing any existing entry
    pub fn set(&mut self, key: ThemeKey, value: String, ttl: StdDuration) -> Result<(), CacheError> {
        self.set_at(key, value, ttl, Utc::now())
    }

    /// Clock-explicit form of `set`
    pub fn set_at(
        &mut self,
        key: ThemeKey,
        value: String,
        ttl: StdDuration,
        now: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let expires_at = ttl_to_duration(ttl)
            .and_then(|d| now.checked_add_signed(d))
            .ok_or(CacheError::InvalidTtl(ttl))?;

        self.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                expires_at,
            },
        );
        Ok(())
    }

    /// Removes one entry, returning whether it existed
    pub fn remove(&mut self, key: &ThemeKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Removes every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Removes every entry with `expires_at <= now`, returning how many went
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now));
        before - self.entries.len()
    }

    /// Whether a fresh entry is held for `key`, without purging anything
    pub fn contains_fresh(&self, key: &ThemeKey, now: DateTime<Utc>) -> bool {
        self.entries.get(key).is_some_and(|e| e.is_fresh(now))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All held entries, including any not yet purged
    pub fn entries(&self) -> impl Iterator<Item = (&ThemeKey, &CacheEntry)> {
        self.entries.iter()
    }
}

fn ttl_to_duration(ttl: StdDuration) -> Option<Duration> {
    if ttl.is_zero() {
        return None;
    }
    Duration::from_std(ttl).ok()
}
