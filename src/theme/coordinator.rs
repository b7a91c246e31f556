//! Theme retrieval coordinator
//!
//! The single entry point for obtaining a theme. Combines a cache-first
//! lookup, at most one outstanding fetch per key, and population of the
//! cache and its session snapshot.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

use super::{Language, Song, ThemeError, ThemeFetcher, ThemeKey, ThemeLookup};
use crate::cache::{
    CacheError, FetchOutcome, FlightReceiver, LoadingTracker, SessionCache, ThemeStore,
    DEFAULT_THEME_TTL,
};

/// Store and tracker, always mutated together under one lock
#[derive(Debug, Default)]
struct CacheState {
    store: ThemeStore,
    loading: LoadingTracker,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<CacheState>,
    session: Option<SessionCache>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, state: &CacheState) {
        if let Some(session) = &self.session {
            session.save(&state.store);
        }
    }
}

/// What a lookup should do next, decided atomically under the lock
enum Step {
    Hit(String),
    Pending(FlightReceiver),
    Fetch(FlightGuard),
}

/// Holds the loading slot for one key until the fetch settles
///
/// Dropping an unsettled guard (error unwinding, cancelled future) still
/// releases the slot.
struct FlightGuard {
    shared: Arc<Shared>,
    key: ThemeKey,
    armed: bool,
}

impl FlightGuard {
    fn settle(mut self, outcome: FetchOutcome, ttl: StdDuration) {
        let mut state = self.shared.lock();
        if let Ok(Some(text)) = &outcome {
            match state.store.set(self.key.clone(), text.clone(), ttl) {
                Ok(()) => self.shared.persist(&state),
                Err(e) => warn!(key = %self.key, error = %e, "theme not cached"),
            }
        }
        state.loading.settle(&self.key, outcome);
        drop(state);
        self.armed = false;
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if self.armed {
            self.shared.lock().loading.set_loading(&self.key, false);
            debug!(key = %self.key, "abandoned fetch released its loading slot");
        }
    }
}

/// Per-language result of `ThemeCoordinator::preload_song_themes`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadReport {
    /// Already cached, no request made
    pub cached: Vec<Language>,
    /// Fetched and cached by this call
    pub fetched: Vec<Language>,
    /// Backend had no theme
    pub unavailable: Vec<Language>,
    /// Another fetch was already outstanding
    pub in_progress: Vec<Language>,
    /// Fetch failed; nothing cached
    pub failed: Vec<(Language, ThemeError)>,
}

/// Cache-first, de-duplicated theme retrieval
///
/// Owns the TTL store and the loading tracker exclusively. Share it between
/// tasks with `Arc`; the lock is never held across an `.await`.
pub struct ThemeCoordinator<F> {
    fetcher: F,
    shared: Arc<Shared>,
    ttl: StdDuration,
}

impl<F: ThemeFetcher> ThemeCoordinator<F> {
    /// Creates a coordinator with an empty, unpersisted cache
    pub fn new(fetcher: F) -> Self {
        Self::from_parts(fetcher, ThemeStore::new(), None)
    }

    /// Creates a coordinator whose cache is restored from, and saved to, `session`
    pub fn with_session(fetcher: F, session: SessionCache) -> Self {
        let store = session.load(Utc::now());
        Self::from_parts(fetcher, store, Some(session))
    }

    fn from_parts(fetcher: F, store: ThemeStore, session: Option<SessionCache>) -> Self {
        Self {
            fetcher,
            shared: Arc::new(Shared {
                state: Mutex::new(CacheState {
                    store,
                    loading: LoadingTracker::new(),
                }),
                session,
            }),
            ttl: DEFAULT_THEME_TTL,
        }
    }

    /// Sets how long fetched themes stay cached
    pub fn with_ttl(mut self, ttl: StdDuration) -> Result<Self, CacheError> {
        if ttl.is_zero() || chrono::Duration::from_std(ttl).is_err() {
            return Err(CacheError::InvalidTtl(ttl));
        }
        self.ttl = ttl;
        Ok(self)
    }

    pub fn ttl(&self) -> StdDuration {
        self.ttl
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Returns the theme for a song in a language
    ///
    /// Serves a fresh cached value without touching the network. If another
    /// fetch for the same key is outstanding, returns `InProgress` instead of
    /// starting a second one. Otherwise fetches, caches on success and
    /// returns the value. Failures and empty results are never cached.
    pub async fn get_theme(
        &self,
        song_id: &str,
        language: Language,
    ) -> Result<ThemeLookup, ThemeError> {
        let key = key_for(song_id, language)?;
        match self.begin(&key) {
            Step::Hit(text) => Ok(ThemeLookup::Ready(text)),
            Step::Pending(_) => {
                debug!(key = %key, "theme fetch already in progress");
                Ok(ThemeLookup::InProgress)
            }
            Step::Fetch(guard) => into_lookup(self.run_fetch(guard, &key).await),
        }
    }

    /// Like `get_theme`, but waits for an outstanding fetch instead of
    /// returning `InProgress`
    ///
    /// Every waiter receives the same value or the same error as the fetch
    /// it waited on. `Ok(None)` means the backend had no theme.
    pub async fn wait_theme(
        &self,
        song_id: &str,
        language: Language,
    ) -> Result<Option<String>, ThemeError> {
        let key = key_for(song_id, language)?;
        loop {
            match self.begin(&key) {
                Step::Hit(text) => return Ok(Some(text)),
                Step::Fetch(guard) => return self.run_fetch(guard, &key).await,
                Step::Pending(mut rx) => {
                    if rx.changed().await.is_ok() {
                        let settled = rx.borrow().clone();
                        if let Some(outcome) = settled {
                            return outcome;
                        }
                    }
                    // The fetch was abandoned without an outcome; look again.
                }
            }
        }
    }

    /// Drops any cached value for the key and fetches it again
    ///
    /// Returns `InProgress` without invalidating if a fetch is outstanding.
    pub async fn refresh_theme(
        &self,
        song_id: &str,
        language: Language,
    ) -> Result<ThemeLookup, ThemeError> {
        let key = key_for(song_id, language)?;
        {
            let mut state = self.shared.lock();
            if state.loading.is_loading(&key) {
                return Ok(ThemeLookup::InProgress);
            }
            if state.store.remove(&key) {
                self.shared.persist(&state);
            }
        }
        self.get_theme(key.song_id(), language).await
    }

    /// Prefers the song's author-supplied theme, falling back to a generated one
    pub async fn resolve_theme(
        &self,
        song: &Song,
        language: Language,
    ) -> Result<ThemeLookup, ThemeError> {
        if let Some(theme) = song.static_theme(language) {
            return Ok(ThemeLookup::Ready(theme.to_string()));
        }
        self.get_theme(&song.id.to_string(), language).await
    }

    /// Fetches every language not already cached for a song, concurrently
    ///
    /// Individual failures are logged and reported, not returned as errors.
    pub async fn preload_song_themes(&self, song_id: &str) -> Result<PreloadReport, ThemeError> {
        let song_id = normalize_song_id(song_id)?;
        let mut report = PreloadReport::default();

        let to_load: Vec<Language> = {
            let state = self.shared.lock();
            let now = Utc::now();
            Language::ALL
                .into_iter()
                .filter(|lang| {
                    let cached = state
                        .store
                        .contains_fresh(&ThemeKey::new(song_id, *lang), now);
                    if cached {
                        report.cached.push(*lang);
                    }
                    !cached
                })
                .collect()
        };

        let results = join_all(
            to_load
                .iter()
                .map(|lang| self.get_theme(song_id, *lang)),
        )
        .await;

        for (lang, result) in to_load.into_iter().zip(results) {
            match result {
                Ok(ThemeLookup::Ready(_)) => report.fetched.push(lang),
                Ok(ThemeLookup::Unavailable) => report.unavailable.push(lang),
                Ok(ThemeLookup::InProgress) => report.in_progress.push(lang),
                Err(e) => {
                    warn!(song_id = %song_id, language = %lang, error = %e, "failed to preload theme");
                    report.failed.push((lang, e));
                }
            }
        }

        Ok(report)
    }

    /// Removes one cached theme, returning whether it was cached
    pub fn invalidate(&self, song_id: &str, language: Language) -> bool {
        let Ok(key) = key_for(song_id, language) else {
            return false;
        };
        let mut state = self.shared.lock();
        let removed = state.store.remove(&key);
        if removed {
            self.shared.persist(&state);
        }
        removed
    }

    /// Removes every cached theme and the session snapshot
    ///
    /// Outstanding fetches keep their loading slots, so none can be duplicated.
    pub fn clear_cache(&self) {
        let mut state = self.shared.lock();
        state.store.clear();
        if let Some(session) = &self.shared.session {
            session.clear();
        }
        info!("theme cache cleared");
    }

    /// Purges expired entries, returning how many were removed
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    /// Clock-explicit form of `sweep_expired`
    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.shared.lock();
        let removed = state.store.sweep(now);
        if removed > 0 {
            self.shared.persist(&state);
            debug!(removed, "swept expired themes");
        }
        removed
    }

    /// Whether a fetch for this key is outstanding
    pub fn is_loading(&self, song_id: &str, language: Language) -> bool {
        key_for(song_id, language)
            .map(|key| self.shared.lock().loading.is_loading(&key))
            .unwrap_or(false)
    }

    /// Number of entries held, including expired ones not yet purged
    pub fn cached_count(&self) -> usize {
        self.shared.lock().store.len()
    }

    /// Keys of fresh entries with their expiry, soonest first
    pub fn cached_keys(&self) -> Vec<(ThemeKey, DateTime<Utc>)> {
        let now = Utc::now();
        let state = self.shared.lock();
        let mut keys: Vec<_> = state
            .store
            .entries()
            .filter(|(_, entry)| entry.is_fresh(now))
            .map(|(key, entry)| (key.clone(), entry.expires_at))
            .collect();
        keys.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.to_string().cmp(&b.0.to_string())));
        keys
    }

    fn begin(&self, key: &ThemeKey) -> Step {
        let mut state = self.shared.lock();

        let held = state.store.len();
        if let Some(text) = state.store.get(key) {
            debug!(key = %key, "theme cache hit");
            return Step::Hit(text);
        }
        if state.store.len() < held {
            // lazy expiry purged the entry
            self.shared.persist(&state);
        }

        if let Some(rx) = state.loading.subscribe(key) {
            return Step::Pending(rx);
        }

        state.loading.set_loading(key, true);
        debug!(key = %key, "theme cache miss, fetching");
        Step::Fetch(FlightGuard {
            shared: Arc::clone(&self.shared),
            key: key.clone(),
            armed: true,
        })
    }

    async fn run_fetch(&self, guard: FlightGuard, key: &ThemeKey) -> FetchOutcome {
        let outcome = match self.fetcher.fetch_theme(key.song_id(), key.language()).await {
            Ok(text) => {
                info!(key = %key, "theme fetched");
                Ok(Some(text))
            }
            Err(ThemeError::EmptyResult) => {
                debug!(key = %key, "backend returned no theme");
                Ok(None)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "theme fetch failed");
                Err(e)
            }
        };
        guard.settle(outcome.clone(), self.ttl);
        outcome
    }
}

impl<F> std::fmt::Debug for ThemeCoordinator<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeCoordinator")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

fn normalize_song_id(song_id: &str) -> Result<&str, ThemeError> {
    let song_id = song_id.trim();
    if song_id.is_empty() {
        Err(ThemeError::InvalidSongId)
    } else {
        Ok(song_id)
    }
}

fn key_for(song_id: &str, language: Language) -> Result<ThemeKey, ThemeError> {
    Ok(ThemeKey::new(normalize_song_id(song_id)?, language))
}

fn into_lookup(outcome: FetchOutcome) -> Result<ThemeLookup, ThemeError> {
    match outcome {
        Ok(Some(text)) => Ok(ThemeLookup::Ready(text)),
        Ok(None) => Ok(ThemeLookup::Unavailable),
        Err(e) => Err(e),
    }
}
