//! Core data models for Lyrix themes
//!
//! This module contains the types shared by the cache, the fetcher and the
//! coordinator: supported languages, the composite cache key, lookup results
//! and the song record returned by the backend.

pub mod coordinator;
pub mod fetcher;

pub use coordinator::{PreloadReport, ThemeCoordinator};
pub use fetcher::{ApiEndpoints, HttpThemeFetcher, ThemeError, ThemeFetcher};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Languages the backend can generate themes in
///
/// The wire codes are an external contract with the backend and must match
/// it exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "hin")]
    Hindi,
    #[serde(rename = "urd")]
    Urdu,
}

impl Language {
    /// All supported languages in display order
    pub const ALL: [Language; 3] = [Language::English, Language::Hindi, Language::Urdu];

    /// Returns the backend wire code for this language
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Hindi => "hin",
            Language::Urdu => "urd",
        }
    }

    /// Returns the human-readable language name
    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
            Language::Urdu => "Urdu",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error returned when a string is not one of the supported language codes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported language code '{0}': expected one of en, hin, urd")]
pub struct ParseLanguageError(pub String);

impl FromStr for Language {
    type Err = ParseLanguageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en" => Ok(Language::English),
            "hin" => Ok(Language::Hindi),
            "urd" => Ok(Language::Urdu),
            other => Err(ParseLanguageError(other.to_string())),
        }
    }
}

/// Composite cache key identifying one theme: a song in one language
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThemeKey {
    song_id: String,
    language: Language,
}

impl ThemeKey {
    pub fn new(song_id: impl Into<String>, language: Language) -> Self {
        Self {
            song_id: song_id.into(),
            language,
        }
    }

    pub fn song_id(&self) -> &str {
        &self.song_id
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Parses the `{song_id}_{code}` form produced by `Display`
    ///
    /// Splits on the last underscore so song ids may themselves contain one.
    pub fn parse(raw: &str) -> Option<Self> {
        let (song_id, code) = raw.rsplit_once('_')?;
        if song_id.is_empty() {
            return None;
        }
        let language = code.parse().ok()?;
        Some(Self::new(song_id, language))
    }
}

impl fmt::Display for ThemeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.song_id, self.language.code())
    }
}

/// Outcome of a coordinator lookup that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeLookup {
    /// A fresh theme, either cached or just fetched
    Ready(String),
    /// Another fetch for this key is outstanding; nothing was requested
    InProgress,
    /// The backend answered but had no theme for this song and language
    Unavailable,
}

impl ThemeLookup {
    /// Returns the theme text if one is ready
    pub fn into_text(self) -> Option<String> {
        match self {
            ThemeLookup::Ready(text) => Some(text),
            _ => None,
        }
    }
}

/// A lyricist or poet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: u64,
    pub name: String,
}

/// Song record as returned by `GET /songs/{id}`
///
/// Static themes are supplied by authors and take precedence over generated
/// ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: u64,
    pub title: String,
    pub author: Author,
    #[serde(default)]
    pub english_lyrics: String,
    #[serde(default)]
    pub hindi_lyrics: String,
    #[serde(default)]
    pub urdu_lyrics: String,
    #[serde(default)]
    pub english_theme: Option<String>,
    #[serde(default)]
    pub hindi_theme: Option<String>,
    #[serde(default)]
    pub urdu_theme: Option<String>,
}

impl Song {
    /// Returns the author-supplied theme for a language, ignoring blank values
    pub fn static_theme(&self, language: Language) -> Option<&str> {
        let theme = match language {
            Language::English => self.english_theme.as_deref(),
            Language::Hindi => self.hindi_theme.as_deref(),
            Language::Urdu => self.urdu_theme.as_deref(),
        };
        theme.map(str::trim).filter(|t| !t.is_empty())
    }

    /// Returns the lyrics in a language
    pub fn lyrics(&self, language: Language) -> &str {
        match language {
            Language::English => &self.english_lyrics,
            Language::Hindi => &self.hindi_lyrics,
            Language::Urdu => &self.urdu_lyrics,
        }
    }
}
