//! Command-line interface parsing for Lyrix
//!
//! This module handles parsing of CLI arguments using clap, including
//! language code validation and the flags that override the config file.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::config::{ConfigError, LyrixConfig};
use crate::theme::Language;

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The specified language code is not one the backend supports
    #[error("Invalid language: '{0}'. Valid languages: en, hin, urd")]
    InvalidLanguage(String),
}

/// Lyrix - song themes from the Lyrix backend
#[derive(Parser, Debug)]
#[command(name = "lyrix")]
#[command(about = "Fetch and cache interpretive song themes")]
#[command(version)]
pub struct Cli {
    /// Path to a config file (defaults to the XDG config directory)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Override the backend API base URL
    #[arg(long, value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Override how long fetched themes stay cached
    #[arg(long, value_name = "MINUTES", global = true)]
    pub ttl_minutes: Option<u64>,

    /// Keep the cache in memory only for this run
    #[arg(long, global = true)]
    pub no_persist: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the theme for a song
    ///
    /// Examples:
    ///   lyrix theme 42             # English theme for song 42
    ///   lyrix theme 7 --lang hin   # Hindi theme for song 7
    Theme {
        /// Song identifier
        song_id: String,

        /// Language code: en, hin or urd
        #[arg(long, short, value_name = "LANG", default_value = "en", value_parser = parse_language_arg)]
        lang: Language,

        /// Drop any cached theme and fetch it again
        #[arg(long)]
        refresh: bool,

        /// Skip the song's author-supplied theme and ask for a generated one
        #[arg(long)]
        generated: bool,
    },

    /// Fetch themes in every language for a song
    Preload {
        /// Song identifier
        song_id: String,
    },

    /// Inspect or manage the theme cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// List cached themes and when they expire
    List,
    /// Remove every cached theme
    Clear,
    /// Remove expired themes now
    Sweep,
}

/// Parses a language code argument into a `Language`.
///
/// # Arguments
/// * `s` - The language string from CLI
///
/// # Returns
/// * `Ok(Language)` if the string is exactly one of the supported codes
/// * `Err(CliError::InvalidLanguage)` otherwise
pub fn parse_language_arg(s: &str) -> Result<Language, CliError> {
    s.parse().map_err(|_| CliError::InvalidLanguage(s.to_string()))
}

impl Cli {
    /// Applies flag overrides on top of the loaded config and re-validates
    pub fn apply_overrides(&self, mut config: LyrixConfig) -> Result<LyrixConfig, ConfigError> {
        if let Some(url) = &self.api_url {
            config.api_base_url = url.clone();
        }
        if let Some(ttl) = self.ttl_minutes {
            config.theme_ttl_minutes = ttl;
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_language_arg_valid_codes() {
        assert_eq!(parse_language_arg("en").unwrap(), Language::English);
        assert_eq!(parse_language_arg("hin").unwrap(), Language::Hindi);
        assert_eq!(parse_language_arg("urd").unwrap(), Language::Urdu);
    }

    #[test]
    fn test_parse_language_arg_invalid() {
        let result = parse_language_arg("hi");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Invalid language"));
        assert!(err.to_string().contains("'hi'"));
    }

    #[test]
    fn test_cli_parse_theme_defaults_to_english() {
        let cli = Cli::parse_from(["lyrix", "theme", "42"]);
        assert_eq!(
            cli.command,
            Command::Theme {
                song_id: "42".to_string(),
                lang: Language::English,
                refresh: false,
                generated: false,
            }
        );
        assert!(!cli.no_persist);
    }

    #[test]
    fn test_cli_parse_theme_with_language() {
        let cli = Cli::parse_from(["lyrix", "theme", "7", "--lang", "hin", "--refresh"]);
        match cli.command {
            Command::Theme {
                song_id,
                lang,
                refresh,
                ..
            } => {
                assert_eq!(song_id, "7");
                assert_eq!(lang, Language::Hindi);
                assert!(refresh);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_language() {
        let result = Cli::try_parse_from(["lyrix", "theme", "7", "--lang", "fr"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_cache_actions() {
        let cli = Cli::parse_from(["lyrix", "cache", "sweep"]);
        assert_eq!(
            cli.command,
            Command::Cache {
                action: CacheAction::Sweep
            }
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["lyrix", "preload", "3", "--no-persist", "--ttl-minutes", "5"]);
        assert!(cli.no_persist);
        assert_eq!(cli.ttl_minutes, Some(5));
    }

    #[test]
    fn test_apply_overrides() {
        let cli = Cli::parse_from([
            "lyrix",
            "--api-url",
            "https://lyrix.example.com/api",
            "--ttl-minutes",
            "10",
            "cache",
            "list",
        ]);

        let config = cli.apply_overrides(LyrixConfig::default()).unwrap();

        assert_eq!(config.api_base_url, "https://lyrix.example.com/api");
        assert_eq!(config.theme_ttl_minutes, 10);
    }

    #[test]
    fn test_apply_overrides_rejects_zero_ttl() {
        let cli = Cli::parse_from(["lyrix", "--ttl-minutes", "0", "cache", "list"]);
        assert!(cli.apply_overrides(LyrixConfig::default()).is_err());
    }
}
