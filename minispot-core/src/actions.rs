//! User-initiated playback actions.
//!
//! Each action is a single call against the backend, made directly from the
//! front-end and never routed through the poll loop. Failures are reported
//! back to the caller and never retried, so a slow request cannot end up
//! applied twice.

use crate::backend::{PlaybackBackend, Playlist};
use crate::error::{CoreError, Result};
use crate::playback::TrackInfo;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const LOG_TARGET: &str = "minispot::actions";

/// What happened to a user action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Done,
    /// No track was playing, so there was nothing to act on
    NothingPlaying,
    /// The backend or account does not allow this action; nothing changed
    Unsupported { reason: String },
}

/// Player controls backed by a [`PlaybackBackend`]
pub struct PlayerControls {
    backend: Arc<dyn PlaybackBackend>,
}

impl PlayerControls {
    pub fn new(backend: Arc<dyn PlaybackBackend>) -> Self {
        Self { backend }
    }

    /// # Errors
    ///
    /// Returns backend failures other than unsupported operations.
    pub async fn skip_next(&self) -> Result<ActionOutcome> {
        settle("skip_next", self.backend.skip_next().await)
    }

    /// # Errors
    ///
    /// Returns backend failures other than unsupported operations.
    pub async fn skip_previous(&self) -> Result<ActionOutcome> {
        settle("skip_previous", self.backend.skip_previous().await)
    }

    /// # Errors
    ///
    /// Returns backend failures other than unsupported operations.
    pub async fn toggle_play_pause(&self) -> Result<ActionOutcome> {
        settle("toggle_play_pause", self.backend.toggle_play_pause().await)
    }

    /// Seek to an absolute position in the current track.
    ///
    /// Free accounts cannot seek; that is reported as
    /// [`ActionOutcome::Unsupported`] rather than an error.
    ///
    /// # Errors
    ///
    /// Returns backend failures other than unsupported operations.
    pub async fn seek_to(&self, position: Duration) -> Result<ActionOutcome> {
        settle("seek", self.backend.seek_to(position).await)
    }

    /// Seek to `fraction` (0.0 to 1.0) of the current track's duration.
    ///
    /// Out-of-range fractions are clamped and non-finite ones treated as 0.
    ///
    /// # Errors
    ///
    /// Returns backend failures other than unsupported operations.
    pub async fn seek_to_fraction(&self, fraction: f64) -> Result<ActionOutcome> {
        let track = match self.current_track().await {
            Ok(track) => track,
            Err(e) => return settle("seek", Err(e)),
        };

        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };

        self.seek_to(track.duration.mul_f64(fraction)).await
    }

    /// Save the currently playing track to the user's library.
    ///
    /// # Errors
    ///
    /// Returns backend failures other than unsupported operations.
    pub async fn like_current(&self) -> Result<ActionOutcome> {
        let result = match self.current_track_id().await {
            Ok(id) => self.backend.like_track(&id).await,
            Err(e) => Err(e),
        };
        settle("like", result)
    }

    /// Add the currently playing track to a playlist.
    ///
    /// # Errors
    ///
    /// Returns backend failures other than unsupported operations.
    pub async fn add_current_to_playlist(&self, playlist_id: &str) -> Result<ActionOutcome> {
        let result = match self.current_track_id().await {
            Ok(id) => self.backend.add_track_to_playlist(playlist_id, &id).await,
            Err(e) => Err(e),
        };
        settle("add_to_playlist", result)
    }

    /// Playlists the current user can add tracks to.
    ///
    /// # Errors
    ///
    /// Returns the backend failure unchanged.
    pub async fn list_playlists(&self) -> Result<Vec<Playlist>> {
        self.backend.list_playlists().await
    }

    /// Track from a fresh backend sample, so actions target what is playing now
    async fn current_track(&self) -> Result<TrackInfo> {
        self.backend
            .current_playback()
            .await?
            .map(|sample| sample.track)
            .ok_or(CoreError::NoActivePlayback)
    }

    async fn current_track_id(&self) -> Result<String> {
        self.current_track()
            .await?
            .id
            .ok_or(CoreError::NoTrackLoaded)
    }
}

/// Fold expected refusals into an outcome; pass real failures through.
fn settle(operation: &str, result: Result<()>) -> Result<ActionOutcome> {
    match result {
        Ok(()) => {
            info!(target: LOG_TARGET, "{} done", operation);
            Ok(ActionOutcome::Done)
        }
        Err(CoreError::NoActivePlayback) => Ok(ActionOutcome::NothingPlaying),
        Err(e @ (CoreError::UnsupportedOperation { .. } | CoreError::NoTrackLoaded)) => {
            warn!(target: LOG_TARGET, "{} skipped: {}", operation, e);
            Ok(ActionOutcome::Unsupported {
                reason: e.to_string(),
            })
        }
        Err(e) => Err(e),
    }
}
