//! Background loop that keeps the [`Session`] in step with the backend.

use crate::backend::PlaybackBackend;
use crate::config::PollingConfig;
use crate::error::{CoreError, Result};
use crate::lyrics::LyricDocument;
use crate::playback::{PlaybackSample, TrackInfo};
use crate::provider::LyricsProvider;
use crate::retry::{RetryPolicy, retry_transient};
use crate::session::{Session, SessionEvent};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const LOG_TARGET: &str = "minispot::poller";

/// Where the poll loop is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollState {
    #[default]
    Idle,
    Authenticating,
    Polling,
    /// Credentials were rejected; polling has halted
    Unauthenticated,
    /// The backend reported no active playback on the last tick
    NoActiveSession,
    Stopped,
}

/// Result of a single successful tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    NothingPlaying,
    SameTrack,
    TrackChanged { lyrics_found: bool },
}

/// Periodic playback poller
pub struct PollLoop {
    backend: Arc<dyn PlaybackBackend>,
    provider: Arc<dyn LyricsProvider>,
    session: Arc<Session>,
    interval: Duration,
    retry: RetryPolicy,
    cancel_token: CancellationToken,
}

impl PollLoop {
    pub fn new(
        backend: Arc<dyn PlaybackBackend>,
        provider: Arc<dyn LyricsProvider>,
        session: Arc<Session>,
        config: &PollingConfig,
    ) -> Self {
        Self {
            backend,
            provider,
            session,
            interval: config.interval(),
            retry: RetryPolicy::from(config),
            cancel_token: CancellationToken::new(),
        }
    }

    /// Share a cancellation token with the rest of the application
    #[must_use]
    pub fn with_cancel_token(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = cancel_token;
        self
    }

    /// Start polling in a background task
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Authenticate, then poll until cancelled or credentials fail.
    pub async fn run(&self) {
        info!(target: LOG_TARGET, "Starting {} poller", self.backend.name());

        self.session.set_state(PollState::Authenticating).await;
        let auth = retry_transient(&self.retry, &self.cancel_token, "authenticate", || {
            self.backend.authenticate()
        })
        .await;

        if let Err(e) = auth {
            if self.cancel_token.is_cancelled() {
                self.session.set_state(PollState::Stopped).await;
            } else {
                self.halt(&e).await;
            }
            return;
        }

        self.session.set_state(PollState::Polling).await;

        loop {
            if self.cancel_token.is_cancelled() {
                break;
            }

            match self.tick().await {
                Ok(outcome) => debug!(target: LOG_TARGET, "Tick: {:?}", outcome),
                Err(e) if e.is_auth_failure() => {
                    self.halt(&e).await;
                    return;
                }
                Err(_) if self.cancel_token.is_cancelled() => break,
                Err(e) => {
                    warn!(target: LOG_TARGET, "Poll failed: {}", e);
                    self.session.emit(SessionEvent::PollFailed {
                        message: e.to_string(),
                    });
                }
            }

            tokio::select! {
                () = self.cancel_token.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        self.session.set_state(PollState::Stopped).await;
        info!(target: LOG_TARGET, "Poller shutting down gracefully");
    }

    /// One poll: sample the backend, then re-anchor or swap tracks.
    ///
    /// # Errors
    ///
    /// Returns the backend error once retries are exhausted or the error is
    /// not retryable. Lyric provider failures never surface here.
    pub async fn tick(&self) -> Result<TickOutcome> {
        let sample = retry_transient(&self.retry, &self.cancel_token, "current_playback", || {
            self.sample_playback()
        })
        .await?;

        let Some((sample, observed_at)) = sample else {
            self.session.set_nothing_playing().await;
            return Ok(TickOutcome::NothingPlaying);
        };

        let previous = self.session.current_track().await;
        if !sample.track_changed(previous.as_ref()) {
            self.session.apply_sample(&sample, observed_at).await;
            return Ok(TickOutcome::SameTrack);
        }

        info!(
            target: LOG_TARGET,
            "Track changed: {} - {}",
            sample.track.name,
            sample.track.artist_display()
        );

        let (document, lyrics_found) = self.load_lyrics(&sample.track).await;
        self.session
            .replace_track(sample, Arc::new(document), observed_at)
            .await;

        Ok(TickOutcome::TrackChanged { lyrics_found })
    }

    /// Query the backend, pushing progress forward by half the round trip.
    async fn sample_playback(&self) -> Result<Option<(PlaybackSample, Instant)>> {
        let request_start = Instant::now();
        let sample = self.backend.current_playback().await?;
        let received_at = Instant::now();

        // Assume the position was read halfway through the request
        let latency_compensation = received_at.duration_since(request_start) / 2;

        Ok(sample.map(|mut sample| {
            sample.progress = sample.progress.saturating_add(latency_compensation);
            (sample, received_at)
        }))
    }

    /// Fetch and parse lyrics, degrading to the placeholder on any failure.
    async fn load_lyrics(&self, track: &TrackInfo) -> (LyricDocument, bool) {
        let query = track.lyrics_query();

        match self.provider.search(&query).await {
            Ok(Some(raw)) => {
                let document = LyricDocument::parse(Some(&raw));
                info!(
                    target: LOG_TARGET,
                    "Loaded {} lyrics from {} ({} lines)",
                    if document.is_synced() { "synced" } else { "plain" },
                    self.provider.name(),
                    document.lines().len()
                );
                (document, true)
            }
            Ok(None) => {
                let e = CoreError::LyricsNotFound {
                    query: query.search_string(),
                };
                info!(target: LOG_TARGET, "{}", e);
                (LyricDocument::placeholder(), false)
            }
            Err(e) => {
                warn!(target: LOG_TARGET, "Lyrics lookup failed: {}", e);
                (LyricDocument::placeholder(), false)
            }
        }
    }

    async fn halt(&self, e: &CoreError) {
        error!(target: LOG_TARGET, "Polling halted: {}", e);
        self.session.set_state(PollState::Unauthenticated).await;
        self.session.emit(SessionEvent::Halted {
            reason: e.to_string(),
        });
    }
}
