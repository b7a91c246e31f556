//! Configuration file handling
//!
//! Settings live in `config.toml` under the XDG config directory
//! (`~/.config/lyrix/` on Linux). A missing file means defaults; missing
//! keys fall back to their defaults individually.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::theme::fetcher::DEFAULT_API_BASE_URL;

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LyrixConfig {
    /// Base URL of the Lyrix backend API
    pub api_base_url: String,
    /// Per-request timeout for backend calls
    pub request_timeout_secs: u64,
    /// How long fetched themes stay cached
    pub theme_ttl_minutes: u64,
    /// Interval between expiry sweeps
    pub sweep_interval_secs: u64,
    /// Default log filter when `LYRIX_LOG` is unset
    pub log_level: String,
    /// Directory for the session snapshot; defaults to the XDG cache dir
    pub session_dir: Option<PathBuf>,
}

impl Default for LyrixConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: 20,
            theme_ttl_minutes: 30,
            sweep_interval_secs: 300,
            log_level: "warn".to_string(),
            session_dir: None,
        }
    }
}

impl LyrixConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn theme_ttl(&self) -> Duration {
        Duration::from_secs(self.theme_ttl_minutes.saturating_mul(60))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Rejects values the cache and HTTP client cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api_base_url must not be empty".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.theme_ttl_minutes == 0 {
            return Err(ConfigError::Invalid(
                "theme_ttl_minutes must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default location of `config.toml`, if a home directory is available
pub fn default_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "lyrix")?;
    Some(proj.config_dir().join("config.toml"))
}

/// Loads configuration from `override_path` or the default location
pub fn load(override_path: Option<&Path>) -> Result<LyrixConfig, ConfigError> {
    let path = match override_path {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) => p,
            None => return Ok(LyrixConfig::default()),
        },
    };

    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && override_path.is_none() => {
            return Ok(LyrixConfig::default());
        }
        Err(source) => return Err(ConfigError::Io { path, source }),
    };

    let cfg: LyrixConfig =
        toml::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(contents: &str) -> (PathBuf, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, contents).expect("Should write config");
        (path, temp_dir)
    }

    #[test]
    fn test_defaults() {
        let cfg = LyrixConfig::default();
        assert_eq!(cfg.api_base_url, "http://127.0.0.1:5000/api");
        assert_eq!(cfg.theme_ttl(), Duration::from_secs(30 * 60));
        assert_eq!(cfg.sweep_interval(), Duration::from_secs(300));
        assert_eq!(cfg.request_timeout(), Duration::from_secs(20));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let (path, _temp_dir) = write_config(
            r#"
            api_base_url = "https://lyrix.example.com/api"
            theme_ttl_minutes = 10
            "#,
        );

        let cfg = load(Some(&path)).expect("config should load");

        assert_eq!(cfg.api_base_url, "https://lyrix.example.com/api");
        assert_eq!(cfg.theme_ttl(), Duration::from_secs(600));
        assert_eq!(cfg.sweep_interval_secs, 300);
        assert!(cfg.session_dir.is_none());
    }

    #[test]
    fn test_zero_ttl_is_rejected() {
        let (path, _temp_dir) = write_config("theme_ttl_minutes = 0");

        let err = load(Some(&path)).unwrap_err();

        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("theme_ttl_minutes"));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let (path, _temp_dir) = write_config("theme_ttl_minutes = \"soon\"");

        let err = load(Some(&path)).unwrap_err();

        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("absent.toml");

        let err = load(Some(&path)).unwrap_err();

        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_toml_round_trip() {
        let cfg = LyrixConfig {
            session_dir: Some(PathBuf::from("/tmp/lyrix")),
            ..LyrixConfig::default()
        };

        let raw = toml::to_string_pretty(&cfg).unwrap();
        let parsed: LyrixConfig = toml::from_str(&raw).unwrap();

        assert_eq!(parsed, cfg);
    }
}
