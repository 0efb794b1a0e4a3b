use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // Configuration errors
    #[error("Config file not found at {path}. A template has been created - please edit it with your Spotify credentials and restart.")]
    ConfigNotFound { path: PathBuf },

    #[error("Missing required config field: {field}")]
    ConfigMissingField { field: String },

    #[error("Invalid config value for {field}: {reason}")]
    ConfigInvalid { field: String, reason: String },

    #[error("Failed to parse config file: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    // Playback backend errors
    #[error("Playback backend unavailable: {reason}")]
    BackendUnavailable { reason: String },

    #[error("Playback backend rate limited, retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Operation {operation} not supported: {reason}")]
    UnsupportedOperation { operation: String, reason: String },

    #[error("Playback not active on any device")]
    NoActivePlayback,

    #[error("Current track has no backend id (local file?)")]
    NoTrackLoaded,

    // Lyrics errors
    #[error("Lyrics not found for: {query}")]
    LyricsNotFound { query: String },

    #[error("Lyrics provider {provider} failed: {reason}")]
    LyricsProviderFailed { provider: String, reason: String },

    #[error("Failed to parse LRC line {line:?}: {reason}")]
    LrcParse { line: String, reason: String },

    // Network errors
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Whether the failure is transient and worth retrying with backoff.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable { .. } | Self::RateLimited { .. } | Self::Network(_)
        )
    }

    /// Minimum wait the backend asked for before the next attempt
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Whether the failure means credentials are bad and polling must stop.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
