//! Authorization-code login with a cached, refreshable token.
//!
//! On startup the token cache is tried first. Only when there is no usable
//! token does the interactive flow run: a one-route axum server is bound to
//! the redirect URI, the browser is pointed at Spotify's consent page, and
//! the `code` from the redirect is exchanged for a token.

use crate::config::SpotifyProviderConfig;
use crate::error::{Result, SpotifyError};
use axum::Router;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use rspotify::{AuthCodeSpotify, Credentials, OAuth, Token, prelude::*, scopes};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How long to wait for the user to finish the consent page
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(600);

/// Refresh when the token expires within this many seconds
const REFRESH_MARGIN_SECS: i64 = 60;

/// On-disk form of a [`Token`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CachedToken {
    access_token: String,
    refresh_token: Option<String>,
    /// Unix timestamp
    expires_at: Option<i64>,
    scopes: Vec<String>,
}

impl CachedToken {
    fn from_token(token: &Token) -> Self {
        let mut scopes: Vec<String> = token.scopes.iter().cloned().collect();
        scopes.sort();
        Self {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token.expires_at.map(|at| at.timestamp()),
            scopes,
        }
    }

    fn into_token(self) -> Token {
        Token {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self
                .expires_at
                .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0)),
            expires_in: chrono::TimeDelta::zero(),
            scopes: self.scopes.into_iter().collect(),
        }
    }

    fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn store(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Whether `token` is missing an expiry or expires within `margin_secs` of `now`
fn expires_within(token: &Token, now: chrono::DateTime<chrono::Utc>, margin_secs: i64) -> bool {
    token
        .expires_at
        .is_some_and(|at| (at - now).num_seconds() <= margin_secs)
}

/// Spotify login state and the authenticated API client
pub struct SpotifyAuth {
    client: AuthCodeSpotify,
    cache_path: PathBuf,
}

impl SpotifyAuth {
    #[must_use]
    pub fn new(config: &SpotifyProviderConfig) -> Self {
        let creds = Credentials::new(&config.client_id, &config.client_secret);
        let oauth = OAuth {
            redirect_uri: config.redirect_uri.clone(),
            scopes: scopes!(
                "user-read-playback-state",
                "user-modify-playback-state",
                "user-library-modify",
                "playlist-read-private",
                "playlist-modify-public",
                "playlist-modify-private"
            ),
            ..Default::default()
        };

        Self {
            client: AuthCodeSpotify::new(creds, oauth),
            cache_path: crate::paths::spotify_token_cache_path(),
        }
    }

    /// The API client; usable once [`Self::ensure_authenticated`] succeeded
    #[must_use]
    pub const fn client(&self) -> &AuthCodeSpotify {
        &self.client
    }

    /// Restore the cached token, or run the browser login if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the cached token cannot be refreshed and the
    /// interactive login fails.
    pub async fn ensure_authenticated(&self) -> Result<()> {
        match self.restore_cached().await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            // Spotify unreachable; the cached token is still good to retry with
            Err(e) if e.is_transient() => return Err(e),
            Err(e) => warn!("Ignoring unusable token cache: {}", e),
        }

        info!("No usable Spotify token, starting browser login");
        self.login_interactive().await
    }

    /// Load the cached token, refreshing it if it is about to expire.
    async fn restore_cached(&self) -> Result<bool> {
        let Some(cached) = CachedToken::load(&self.cache_path)? else {
            debug!("No token cache at {}", self.cache_path.display());
            return Ok(false);
        };

        let token = cached.into_token();
        let stale = expires_within(&token, chrono::Utc::now(), REFRESH_MARGIN_SECS);
        if stale && token.refresh_token.is_none() {
            info!("Cached token expired without a refresh token");
            return Ok(false);
        }

        *self.token_slot().await? = Some(token);
        if stale {
            self.refresh().await?;
        }

        info!("Restored cached Spotify token");
        Ok(true)
    }

    /// Refresh the access token if it expires soon.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh request fails.
    pub async fn ensure_token_fresh(&self) -> Result<()> {
        let stale = self
            .token_slot()
            .await?
            .as_ref()
            .is_some_and(|token| expires_within(token, chrono::Utc::now(), REFRESH_MARGIN_SECS));

        if stale {
            self.refresh().await?;
        }
        Ok(())
    }

    /// Exchange the refresh token for a new access token and cache it.
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyError::AuthFailed`] if Spotify rejects the refresh
    /// token, a transient error if Spotify could not be reached, or an I/O
    /// error if the cache cannot be written.
    pub async fn refresh(&self) -> Result<()> {
        debug!("Refreshing Spotify access token");
        self.client
            .refresh_token()
            .await
            .map_err(|e| self.refresh_failed(e))?;
        self.persist().await
    }

    /// Classify a refresh failure, dropping the token cache if it was rejected.
    fn refresh_failed(&self, err: rspotify::ClientError) -> SpotifyError {
        let err = SpotifyError::from_refresh(err);
        if matches!(err, SpotifyError::AuthFailed { .. }) {
            warn!("Spotify rejected the refresh token; the next start will log in again");
            self.forget();
        } else {
            warn!("Token refresh failed, will retry: {}", err);
        }
        err
    }

    /// Delete the token cache so the next start logs in again
    fn forget(&self) {
        if self.cache_path.exists()
            && let Err(e) = fs::remove_file(&self.cache_path)
        {
            warn!("Could not remove {}: {}", self.cache_path.display(), e);
        }
    }

    async fn token_slot(&self) -> Result<futures::lock::MutexGuard<'_, Option<Token>>> {
        self.client
            .token
            .lock()
            .await
            .map_err(|_| SpotifyError::AuthFailed {
                reason: "token lock poisoned".into(),
            })
    }

    async fn persist(&self) -> Result<()> {
        let slot = self.token_slot().await?;
        if let Some(token) = slot.as_ref() {
            CachedToken::from_token(token).store(&self.cache_path)?;
            debug!("Saved Spotify token to {}", self.cache_path.display());
        }
        Ok(())
    }

    /// Browser consent flow with a local callback server.
    ///
    /// # Errors
    ///
    /// Returns an error if the callback server cannot bind, the user denies
    /// access, the wait times out, or the code exchange fails.
    pub async fn login_interactive(&self) -> Result<()> {
        let (addr, callback_path) = callback_address(&self.client.oauth.redirect_uri)?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| SpotifyError::AuthFailed {
                reason: format!("cannot listen on {addr}: {e}"),
            })?;

        let auth_url = self
            .client
            .get_authorize_url(false)
            .map_err(|e| SpotifyError::AuthFailed {
                reason: format!("cannot build authorize URL: {e}"),
            })?;

        println!("Log in to Spotify to continue:\n  {auth_url}");
        if let Err(e) = open::that(&auth_url) {
            warn!("Could not open browser automatically: {}", e);
        }
        info!("Waiting for Spotify redirect on http://{}{}", addr, callback_path);

        let code = receive_code(listener, &callback_path).await?;

        self.client
            .request_token(&code)
            .await
            .map_err(|e| SpotifyError::AuthFailed {
                reason: format!("code exchange failed: {e}"),
            })?;
        self.persist().await?;

        info!("Logged in to Spotify");
        Ok(())
    }
}

/// Socket address and path to serve the redirect URI on
fn callback_address(redirect_uri: &str) -> Result<(SocketAddr, String)> {
    let url = url::Url::parse(redirect_uri).map_err(|e| SpotifyError::AuthFailed {
        reason: format!("invalid redirect URI {redirect_uri:?}: {e}"),
    })?;

    let host = match url.host_str() {
        None | Some("localhost") => "127.0.0.1",
        Some(host) => host,
    };
    let port = url.port_or_known_default().unwrap_or(8888);

    let addr = format!("{host}:{port}")
        .parse()
        .map_err(|e| SpotifyError::AuthFailed {
            reason: format!("redirect host must be an IP address: {e}"),
        })?;

    Ok((addr, url.path().to_string()))
}

/// Query parameters Spotify appends to the redirect
#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

type CallbackResult = std::result::Result<String, String>;

async fn handle_callback(
    State(tx): State<mpsc::Sender<CallbackResult>>,
    Query(params): Query<CallbackParams>,
) -> Html<&'static str> {
    let (result, page) = match (params.code, params.error) {
        (Some(code), _) => (Ok(code), LOGIN_DONE_HTML),
        (None, Some(error)) => (Err(error), LOGIN_FAILED_HTML),
        (None, None) => (Err("no code in redirect".to_string()), LOGIN_FAILED_HTML),
    };
    let _ = tx.send(result).await;
    Html(page)
}

/// Serve the callback route until a code or error arrives.
async fn receive_code(listener: tokio::net::TcpListener, callback_path: &str) -> Result<String> {
    let (tx, mut rx) = mpsc::channel(1);
    let app = Router::new()
        .route(callback_path, get(handle_callback))
        .with_state(tx);
    let server = axum::serve(listener, app);

    tokio::select! {
        received = rx.recv() => match received {
            Some(Ok(code)) => Ok(code),
            Some(Err(error)) => Err(SpotifyError::AuthFailed {
                reason: format!("authorization denied: {error}"),
            }),
            None => Err(SpotifyError::AuthFailed {
                reason: "callback channel closed".into(),
            }),
        },
        _ = server => Err(SpotifyError::AuthFailed {
            reason: "callback server stopped".into(),
        }),
        () = tokio::time::sleep(CALLBACK_TIMEOUT) => Err(SpotifyError::AuthFailed {
            reason: format!(
                "no redirect within {} minutes",
                CALLBACK_TIMEOUT.as_secs() / 60
            ),
        }),
    }
}

const LOGIN_DONE_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>minispot</title></head>
<body style="font-family: sans-serif; text-align: center; padding: 50px; background: #191414; color: #1DB954;">
    <h1>minispot is connected to Spotify</h1>
    <p>You can close this tab and go back to the terminal.</p>
</body>
</html>"#;

const LOGIN_FAILED_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>minispot</title></head>
<body style="font-family: sans-serif; text-align: center; padding: 50px;">
    <h1>Spotify login failed</h1>
    <p>Check the terminal for details, then restart minispot.</p>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rspotify::http::HttpError;
    use std::collections::HashSet;

    fn token(expires_at: Option<chrono::DateTime<chrono::Utc>>) -> Token {
        Token {
            access_token: "access".into(),
            refresh_token: Some("refresh".into()),
            expires_at,
            expires_in: chrono::TimeDelta::zero(),
            scopes: HashSet::from(["user-read-playback-state".to_string()]),
        }
    }

    #[test]
    fn test_cached_token_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("minispot-oauth-{}", std::process::id()));
        let path = dir.join("token.json");
        let expires = chrono::DateTime::from_timestamp(1_900_000_000, 0);
        let cached = CachedToken::from_token(&token(expires));

        cached.store(&path).unwrap();
        let loaded = CachedToken::load(&path).unwrap().unwrap();
        let _ = fs::remove_dir_all(&dir);

        assert_eq!(loaded, cached);
        let restored = loaded.into_token();
        assert_eq!(restored.expires_at, expires);
        assert!(restored.scopes.contains("user-read-playback-state"));
    }

    #[test]
    fn test_missing_cache_is_none() {
        let path = std::env::temp_dir().join("minispot-oauth-does-not-exist.json");
        assert!(CachedToken::load(&path).unwrap().is_none());
    }

    #[test]
    fn test_expires_within() {
        let now = chrono::Utc::now();

        assert!(expires_within(
            &token(Some(now + chrono::TimeDelta::seconds(30))),
            now,
            REFRESH_MARGIN_SECS
        ));
        assert!(!expires_within(
            &token(Some(now + chrono::TimeDelta::seconds(3600))),
            now,
            REFRESH_MARGIN_SECS
        ));
        assert!(!expires_within(&token(None), now, REFRESH_MARGIN_SECS));
    }

    #[test]
    fn test_callback_address() {
        let (addr, path) = callback_address("http://localhost:8888/callback").unwrap();
        assert_eq!(addr, "127.0.0.1:8888".parse().unwrap());
        assert_eq!(path, "/callback");

        let (addr, _) = callback_address("http://127.0.0.1/cb").unwrap();
        assert_eq!(addr.port(), 80);

        assert!(callback_address("not a uri").is_err());
    }

    fn auth_with_cache(path: &Path) -> SpotifyAuth {
        let config = SpotifyProviderConfig {
            client_id: "id".into(),
            client_secret: "secret".into(),
            redirect_uri: "http://127.0.0.1:8888/callback".into(),
        };
        let mut auth = SpotifyAuth::new(&config);
        auth.cache_path = path.to_path_buf();
        auth
    }

    fn temp_cache(name: &str) -> PathBuf {
        let path = std::env::temp_dir()
            .join(format!("minispot-oauth-{name}-{}", std::process::id()))
            .join("token.json");
        CachedToken::from_token(&token(None)).store(&path).unwrap();
        path
    }

    #[test]
    fn test_rejected_refresh_forgets_cache() {
        let path = temp_cache("rejected");
        let auth = auth_with_cache(&path);

        let err = auth.refresh_failed(rspotify::ClientError::InvalidToken);

        assert!(matches!(err, SpotifyError::AuthFailed { .. }));
        assert!(!path.exists());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_unreachable_refresh_keeps_cache() {
        let path = temp_cache("unreachable");
        let auth = auth_with_cache(&path);
        let transport = reqwest::Client::new()
            .get("not a url")
            .send()
            .await
            .unwrap_err();

        let err = auth.refresh_failed(HttpError::from(transport).into());

        assert!(err.is_transient());
        assert!(path.exists());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
