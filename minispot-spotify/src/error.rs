use minispot_core::CoreError;
use rspotify::ClientError;
use rspotify::http::HttpError;
use std::time::Duration;
use thiserror::Error;

const REFRESH_OPERATION: &str = "token_refresh";

/// Errors from the Spotify Web API and the OAuth flow.
///
/// API failures are classified by HTTP status when they happen, so the
/// conversion into [`CoreError`] only has to map variants.
#[derive(Debug, Error)]
pub enum SpotifyError {
    /// Credentials are missing, rejected, or could not be refreshed.
    #[error("Spotify authentication failed: {reason}")]
    AuthFailed { reason: String },

    /// The account may not perform this call (typically Premium-only endpoints).
    #[error("Spotify refused {operation}: {reason}")]
    Forbidden {
        operation: &'static str,
        reason: String,
    },

    #[error("Spotify API rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u32 },

    /// No active Spotify playback on any device.
    #[error("Spotify playback not active on any device")]
    NoActivePlayback,

    /// Network trouble or a 5xx from Spotify.
    #[error("Spotify unavailable during {operation}: {reason}")]
    Unavailable {
        operation: &'static str,
        reason: String,
    },

    #[error("Invalid Spotify id: {0}")]
    InvalidId(#[from] rspotify::model::IdError),

    /// Any other error from the Spotify API client.
    #[error("Spotify API error: {0}")]
    Api(#[from] ClientError),

    /// Failed to read or write the token cache file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The token cache file is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SpotifyError {
    /// Classify a client error from `operation` by its HTTP status.
    #[must_use]
    pub fn from_api(operation: &'static str, err: ClientError) -> Self {
        match err {
            ClientError::Http(http) => match *http {
                HttpError::StatusCode(response) => {
                    let status = response.status();
                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|value| value.to_str().ok())
                        .and_then(parse_retry_after);
                    Self::from_status(operation, status.as_u16(), &status.to_string(), retry_after)
                }
                HttpError::Client(e) => Self::Unavailable {
                    operation,
                    reason: e.to_string(),
                },
            },
            other => Self::Api(other),
        }
    }

    /// Classify a failed token refresh.
    ///
    /// Only a response from the token endpoint that rejects the refresh token
    /// (400 `invalid_grant`, 401) is a credential failure. Transport errors,
    /// 5xx and 429 leave the token usable once Spotify is reachable again.
    #[must_use]
    pub fn from_refresh(err: ClientError) -> Self {
        match err {
            ClientError::Http(http) => match *http {
                HttpError::StatusCode(response) => {
                    let status = response.status();
                    Self::refresh_status(status.as_u16(), &status.to_string())
                }
                HttpError::Client(e) => Self::Unavailable {
                    operation: REFRESH_OPERATION,
                    reason: e.to_string(),
                },
            },
            ClientError::InvalidToken => Self::AuthFailed {
                reason: "no refresh token available".into(),
            },
            other => Self::Api(other),
        }
    }

    fn refresh_status(status: u16, reason: &str) -> Self {
        match status {
            429 | 500..=599 => Self::from_status(REFRESH_OPERATION, status, reason, None),
            _ => Self::AuthFailed {
                reason: format!("token refresh rejected: {reason}"),
            },
        }
    }

    /// Whether the error is worth retrying later rather than reporting
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Unavailable { .. } | Self::Api(_)
        )
    }

    fn from_status(
        operation: &'static str,
        status: u16,
        reason: &str,
        retry_after: Option<u32>,
    ) -> Self {
        match status {
            401 => Self::AuthFailed {
                reason: format!("{operation}: {reason}"),
            },
            403 => Self::Forbidden {
                operation,
                reason: reason.to_string(),
            },
            // Player endpoints answer 404 when no device is active
            404 => Self::NoActivePlayback,
            429 => Self::RateLimited {
                retry_after_secs: retry_after.unwrap_or(1),
            },
            500..=599 => Self::Unavailable {
                operation,
                reason: reason.to_string(),
            },
            _ => Self::Forbidden {
                operation,
                reason: format!("unexpected response {reason}"),
            },
        }
    }
}

fn parse_retry_after(value: &str) -> Option<u32> {
    value.trim().parse().ok()
}

impl From<SpotifyError> for CoreError {
    fn from(e: SpotifyError) -> Self {
        match e {
            SpotifyError::AuthFailed { .. } | SpotifyError::Json(_) => Self::AuthenticationFailed {
                reason: e.to_string(),
            },
            SpotifyError::Forbidden { operation, reason } => Self::UnsupportedOperation {
                operation: operation.to_string(),
                reason,
            },
            SpotifyError::InvalidId(_) => Self::UnsupportedOperation {
                operation: "lookup".to_string(),
                reason: e.to_string(),
            },
            SpotifyError::NoActivePlayback => Self::NoActivePlayback,
            SpotifyError::RateLimited { retry_after_secs } => Self::RateLimited {
                retry_after: Duration::from_secs(u64::from(retry_after_secs)),
            },
            SpotifyError::Unavailable { .. }
            | SpotifyError::Api(_) => Self::BackendUnavailable {
                reason: e.to_string(),
            },
            SpotifyError::Io(io) => Self::Io(io),
        }
    }
}

/// Convenience type alias for Results with `SpotifyError`.
pub type Result<T> = std::result::Result<T, SpotifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            SpotifyError::from_status("seek", 401, "401 Unauthorized", None),
            SpotifyError::AuthFailed { .. }
        ));
        assert!(matches!(
            SpotifyError::from_status("seek", 403, "403 Forbidden", None),
            SpotifyError::Forbidden {
                operation: "seek",
                ..
            }
        ));
        assert!(matches!(
            SpotifyError::from_status("next", 404, "404 Not Found", None),
            SpotifyError::NoActivePlayback
        ));
        assert!(matches!(
            SpotifyError::from_status("poll", 429, "429 Too Many Requests", Some(7)),
            SpotifyError::RateLimited { retry_after_secs: 7 }
        ));
        assert!(matches!(
            SpotifyError::from_status("poll", 503, "503 Service Unavailable", None),
            SpotifyError::Unavailable { .. }
        ));
    }

    #[test]
    fn test_retry_after_parsing() {
        assert_eq!(parse_retry_after(" 12 "), Some(12));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn test_core_error_mapping() {
        let auth: CoreError = SpotifyError::AuthFailed {
            reason: "revoked".into(),
        }
        .into();
        assert!(auth.is_auth_failure());

        let limited: CoreError = SpotifyError::RateLimited {
            retry_after_secs: 3,
        }
        .into();
        assert!(limited.is_transient());
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(3)));

        let premium: CoreError = SpotifyError::Forbidden {
            operation: "seek",
            reason: "PREMIUM_REQUIRED".into(),
        }
        .into();
        assert!(matches!(
            premium,
            CoreError::UnsupportedOperation { ref operation, .. } if operation == "seek"
        ));

        let idle: CoreError = SpotifyError::NoActivePlayback.into();
        assert!(matches!(idle, CoreError::NoActivePlayback));
    }

    #[test]
    fn test_refresh_rejection_is_auth_failure() {
        for status in [400, 401, 403] {
            let err = SpotifyError::refresh_status(status, "rejected");
            assert!(matches!(err, SpotifyError::AuthFailed { .. }), "{status}");
            assert!(CoreError::from(err).is_auth_failure());
        }
    }

    #[test]
    fn test_refresh_server_trouble_is_transient() {
        for status in [429, 500, 502, 503] {
            let err = SpotifyError::refresh_status(status, "busy");
            assert!(err.is_transient(), "{status}");

            let core = CoreError::from(err);
            assert!(core.is_transient());
            assert!(!core.is_auth_failure());
        }
    }

    #[tokio::test]
    async fn test_refresh_transport_error_is_transient() {
        // An unparseable URL fails inside reqwest without touching the network
        let transport = reqwest::Client::new()
            .get("not a url")
            .send()
            .await
            .unwrap_err();

        let err = SpotifyError::from_refresh(ClientError::Http(Box::new(HttpError::Client(
            transport,
        ))));
        assert!(matches!(
            err,
            SpotifyError::Unavailable {
                operation: REFRESH_OPERATION,
                ..
            }
        ));

        let core = CoreError::from(err);
        assert!(core.is_transient());
        assert!(!core.is_auth_failure());
    }

    #[test]
    fn test_missing_refresh_token_is_auth_failure() {
        let err = SpotifyError::from_refresh(ClientError::InvalidToken);
        assert!(matches!(err, SpotifyError::AuthFailed { .. }));
    }
}
