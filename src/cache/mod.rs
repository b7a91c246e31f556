//! Cache module for theme text
//!
//! This module provides the in-memory TTL store, the per-key loading tracker
//! used to de-duplicate fetches, and the session snapshot that lets cached
//! themes survive a restart within the same session.

mod loading;
mod session;
mod store;

pub use loading::{FetchOutcome, FlightReceiver, LoadingTracker};
pub use session::{
    FileStorage, MemoryStorage, PersistenceError, SessionCache, SessionStorage,
    SESSION_STORAGE_KEY,
};
pub use store::{CacheEntry, CacheError, ThemeStore, DEFAULT_THEME_TTL};
