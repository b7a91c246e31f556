//! Lyrix theme retrieval library
//!
//! Fetches interpretive song themes from the Lyrix backend, caches them with
//! a TTL, de-duplicates concurrent fetches per song and language, and keeps
//! a session snapshot of the cache between runs.

pub mod cache;
pub mod cli;
pub mod config;
pub mod logging;
pub mod sweep;
pub mod theme;

pub use cache::{SessionCache, ThemeStore, DEFAULT_THEME_TTL};
pub use theme::{Language, ThemeCoordinator, ThemeError, ThemeKey, ThemeLookup};
