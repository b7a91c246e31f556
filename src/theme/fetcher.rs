//! Lyrix backend theme client
//!
//! This module performs the network side of theme retrieval: one HTTP request
//! per call, with transport and status failures normalized into `ThemeError`.
//! It does not cache or de-duplicate; that is the coordinator's job.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::{Language, Song};

/// Base URL of the development backend
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000/api";

/// Default request timeout for backend calls
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Errors that can occur when retrieving a theme
///
/// `Clone` so that a single failed fetch can be handed to every caller that
/// waited on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThemeError {
    /// Transport failure, timeout or non-success HTTP status
    #[error("{message}")]
    Network {
        message: String,
        status: Option<u16>,
    },

    /// The backend answered successfully but the body held no theme text
    #[error("No theme generated")]
    EmptyResult,

    /// The song identifier was empty
    #[error("Missing song ID")]
    InvalidSongId,
}

impl ThemeError {
    /// Creates a network error without an HTTP status
    pub fn network(message: impl Into<String>) -> Self {
        ThemeError::Network {
            message: message.into(),
            status: None,
        }
    }

    /// Soft errors mean "no theme available" rather than a failure
    pub fn is_soft(&self) -> bool {
        matches!(self, ThemeError::EmptyResult)
    }

    /// HTTP status of the failed response, if there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            ThemeError::Network { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ThemeError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("Network error: request timed out ({})", err)
        } else {
            format!("Network error: {}", err)
        };
        ThemeError::Network {
            message,
            status: err.status().map(|s| s.as_u16()),
        }
    }
}

/// Source of generated theme text
///
/// Implementations issue exactly one request per call.
#[async_trait]
pub trait ThemeFetcher: Send + Sync {
    /// Fetches the theme for a song in a language
    ///
    /// Returns trimmed, non-empty text, `ThemeError::EmptyResult` when the
    /// backend had nothing, or `ThemeError::Network` on failure.
    async fn fetch_theme(&self, song_id: &str, language: Language) -> Result<String, ThemeError>;
}

#[async_trait]
impl<T: ThemeFetcher + ?Sized> ThemeFetcher for Arc<T> {
    async fn fetch_theme(&self, song_id: &str, language: Language) -> Result<String, ThemeError> {
        (**self).fetch_theme(song_id, language).await
    }
}

/// URL construction for the backend endpoints this crate uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    base_url: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

impl ApiEndpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /songs/{id}`
    pub fn song(&self, song_id: &str) -> String {
        format!("{}/songs/{}", self.base_url, urlencoding::encode(song_id))
    }

    /// `GET /songs/{id}/theme?language={code}`
    pub fn theme(&self, song_id: &str, language: Language) -> String {
        format!(
            "{}/songs/{}/theme?language={}",
            self.base_url,
            urlencoding::encode(song_id),
            language.code()
        )
    }
}

/// Error payload the backend sends with failed responses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// HTTP implementation of `ThemeFetcher` backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpThemeFetcher {
    client: Client,
    endpoints: ApiEndpoints,
}

impl HttpThemeFetcher {
    /// Creates a fetcher with the default request timeout
    pub fn new(endpoints: ApiEndpoints) -> Result<Self, ThemeError> {
        Self::with_timeout(endpoints, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a fetcher whose requests fail with `ThemeError::Network` after `timeout`
    pub fn with_timeout(endpoints: ApiEndpoints, timeout: Duration) -> Result<Self, ThemeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ThemeError::network(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, endpoints })
    }

    /// Creates a fetcher with a custom HTTP client
    pub fn with_client(client: Client, endpoints: ApiEndpoints) -> Self {
        Self { client, endpoints }
    }

    pub fn endpoints(&self) -> &ApiEndpoints {
        &self.endpoints
    }

    /// Fetches a song record, including any author-supplied themes
    pub async fn fetch_song(&self, song_id: &str) -> Result<Song, ThemeError> {
        let song_id = validate_song_id(song_id)?;
        let url = self.endpoints.song(song_id);
        debug!(%url, "fetching song");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(error_from_status(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| ThemeError::network(format!("Unexpected song response: {}", e)))
    }
}

#[async_trait]
impl ThemeFetcher for HttpThemeFetcher {
    async fn fetch_theme(&self, song_id: &str, language: Language) -> Result<String, ThemeError> {
        let song_id = validate_song_id(song_id)?;
        let url = self.endpoints.theme(song_id, language);
        debug!(%url, "fetching theme");

        let response = self.client.get(&url).send().await?;
        let text = read_text_body(response).await?;

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ThemeError::EmptyResult);
        }
        Ok(trimmed.to_string())
    }
}

fn validate_song_id(song_id: &str) -> Result<&str, ThemeError> {
    let trimmed = song_id.trim();
    if trimmed.is_empty() {
        Err(ThemeError::InvalidSongId)
    } else {
        Ok(trimmed)
    }
}

/// Reads a text endpoint's body
///
/// JSON responses must carry a bare JSON string; anything else is read as
/// plain text.
async fn read_text_body(response: Response) -> Result<String, ThemeError> {
    let status = response.status();
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("application/json"))
        .unwrap_or(false);
    let body = response.text().await?;

    if !status.is_success() {
        return Err(error_from_status(status, &body));
    }

    if is_json {
        serde_json::from_str::<String>(&body).map_err(|_| {
            ThemeError::network("Unexpected response: expected theme text".to_string())
        })
    } else {
        Ok(body)
    }
}

/// Builds a network error for a failed status, preferring the backend's message
fn error_from_status(status: StatusCode, body: &str) -> ThemeError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )
        });

    ThemeError::Network {
        message,
        status: Some(status.as_u16()),
    }
}
