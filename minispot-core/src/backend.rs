//! Playback backend capability set.

use crate::error::Result;
use crate::playback::PlaybackSample;
use async_trait::async_trait;
use std::time::Duration;

/// A playlist the current user can add tracks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub id: String,
    pub name: String,
}

/// Streaming-service API that reports and controls playback.
///
/// Implementations translate their own failures into the shared taxonomy:
/// [`CoreError::BackendUnavailable`](crate::CoreError::BackendUnavailable) for
/// transient network or service trouble,
/// [`CoreError::AuthenticationFailed`](crate::CoreError::AuthenticationFailed)
/// for bad or revoked credentials, and
/// [`CoreError::UnsupportedOperation`](crate::CoreError::UnsupportedOperation)
/// for actions the account is not allowed to perform.
#[async_trait]
pub trait PlaybackBackend: Send + Sync {
    /// Returns a human-readable name for this backend.
    fn name(&self) -> &'static str;

    /// Establish (or restore) an authenticated session.
    async fn authenticate(&self) -> Result<()>;

    /// Current playback snapshot, or `None` when nothing is playing on any device.
    async fn current_playback(&self) -> Result<Option<PlaybackSample>>;

    async fn skip_next(&self) -> Result<()>;

    async fn skip_previous(&self) -> Result<()>;

    async fn toggle_play_pause(&self) -> Result<()>;

    /// Seek within the current track. May be unsupported for free accounts.
    async fn seek_to(&self, position: Duration) -> Result<()>;

    /// Save a track to the user's library.
    async fn like_track(&self, track_id: &str) -> Result<()>;

    async fn list_playlists(&self) -> Result<Vec<Playlist>>;

    async fn add_track_to_playlist(&self, playlist_id: &str, track_id: &str) -> Result<()>;
}
