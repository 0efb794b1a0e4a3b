//! [`PlaybackBackend`] over the Spotify Web API.

use crate::error::SpotifyError;
use crate::oauth::SpotifyAuth;
use async_trait::async_trait;
use minispot_core::{CoreError, PlaybackBackend, PlaybackSample, Playlist, TrackInfo};
use rspotify::model::{CurrentPlaybackContext, FullTrack, PlayableId, PlayableItem, PlaylistId, TrackId};
use rspotify::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const LOG_TARGET: &str = "minispot::spotify";

/// Page size for the playlist listing (Spotify's maximum)
const PLAYLIST_PAGE_LIMIT: u32 = 50;

pub struct SpotifyBackend {
    auth: Arc<SpotifyAuth>,
}

impl SpotifyBackend {
    #[must_use]
    pub const fn new(auth: Arc<SpotifyAuth>) -> Self {
        Self { auth }
    }

    /// Refresh the token ahead of a request when it is about to expire.
    async fn ready(&self) -> Result<&rspotify::AuthCodeSpotify, SpotifyError> {
        self.auth.ensure_token_fresh().await?;
        Ok(self.auth.client())
    }

    async fn playback_context(&self) -> Result<Option<CurrentPlaybackContext>, SpotifyError> {
        self.ready()
            .await?
            .current_playback(None, None::<Vec<_>>)
            .await
            .map_err(|e| SpotifyError::from_api("current_playback", e))
    }
}

fn to_std(delta: chrono::TimeDelta) -> Duration {
    delta.to_std().unwrap_or(Duration::ZERO)
}

fn track_info(track: &FullTrack) -> TrackInfo {
    let info = TrackInfo::new(
        &track.name,
        track.artists.iter().map(|a| a.name.clone()).collect(),
        &track.album.name,
        to_std(track.duration),
    );

    // Local files have no id
    match &track.id {
        Some(id) => info.with_id(id.id()),
        None => info,
    }
}

/// Convert a playback context; episodes and empty players count as nothing playing
fn playback_sample(context: &CurrentPlaybackContext) -> Option<PlaybackSample> {
    let Some(PlayableItem::Track(track)) = &context.item else {
        return None;
    };

    Some(PlaybackSample::new(
        track_info(track),
        context.progress.map_or(Duration::ZERO, to_std),
        context.is_playing,
    ))
}

#[async_trait]
impl PlaybackBackend for SpotifyBackend {
    fn name(&self) -> &'static str {
        "Spotify"
    }

    async fn authenticate(&self) -> Result<(), CoreError> {
        self.auth.ensure_authenticated().await?;
        Ok(())
    }

    async fn current_playback(&self) -> Result<Option<PlaybackSample>, CoreError> {
        let context = self.playback_context().await?;
        let sample = context.as_ref().and_then(playback_sample);

        debug!(
            target: LOG_TARGET,
            "Polled Spotify: playing={:?}, track={:?}, progress={:?}",
            sample.as_ref().map(|s| s.is_playing),
            sample.as_ref().map(|s| &s.track.name),
            sample.as_ref().map(|s| s.progress)
        );

        Ok(sample)
    }

    async fn skip_next(&self) -> Result<(), CoreError> {
        self.ready()
            .await?
            .next_track(None)
            .await
            .map_err(|e| SpotifyError::from_api("next_track", e))?;
        Ok(())
    }

    async fn skip_previous(&self) -> Result<(), CoreError> {
        self.ready()
            .await?
            .previous_track(None)
            .await
            .map_err(|e| SpotifyError::from_api("previous_track", e))?;
        Ok(())
    }

    async fn toggle_play_pause(&self) -> Result<(), CoreError> {
        let context = self
            .playback_context()
            .await?
            .ok_or(CoreError::NoActivePlayback)?;
        let client = self.ready().await?;

        if context.is_playing {
            client
                .pause_playback(None)
                .await
                .map_err(|e| SpotifyError::from_api("pause", e))?;
        } else {
            client
                .resume_playback(None, None)
                .await
                .map_err(|e| SpotifyError::from_api("resume", e))?;
        }
        Ok(())
    }

    async fn seek_to(&self, position: Duration) -> Result<(), CoreError> {
        let position = chrono::TimeDelta::from_std(position).map_err(|e| {
            CoreError::UnsupportedOperation {
                operation: "seek".into(),
                reason: e.to_string(),
            }
        })?;

        self.ready()
            .await?
            .seek_track(position, None)
            .await
            .map_err(|e| SpotifyError::from_api("seek", e))?;
        Ok(())
    }

    async fn like_track(&self, track_id: &str) -> Result<(), CoreError> {
        let id = TrackId::from_id(track_id).map_err(SpotifyError::from)?;

        self.ready()
            .await?
            .current_user_saved_tracks_add([id])
            .await
            .map_err(|e| SpotifyError::from_api("save_track", e))?;

        info!(target: LOG_TARGET, "Saved track {} to library", track_id);
        Ok(())
    }

    async fn list_playlists(&self) -> Result<Vec<Playlist>, CoreError> {
        let client = self.ready().await?;
        let mut playlists = Vec::new();
        let mut offset = 0;

        loop {
            let page = client
                .current_user_playlists_manual(Some(PLAYLIST_PAGE_LIMIT), Some(offset))
                .await
                .map_err(|e| SpotifyError::from_api("list_playlists", e))?;

            playlists.extend(page.items.into_iter().map(|p| Playlist {
                id: p.id.id().to_string(),
                name: p.name,
            }));

            if page.next.is_none() {
                break;
            }
            offset = offset.saturating_add(PLAYLIST_PAGE_LIMIT);
        }

        Ok(playlists)
    }

    async fn add_track_to_playlist(&self, playlist_id: &str, track_id: &str) -> Result<(), CoreError> {
        let playlist = PlaylistId::from_id(playlist_id).map_err(SpotifyError::from)?;
        let track = TrackId::from_id(track_id).map_err(SpotifyError::from)?;

        self.ready()
            .await?
            .playlist_add_items(playlist, [PlayableId::Track(track)], None)
            .await
            .map_err(|e| SpotifyError::from_api("add_to_playlist", e))?;

        info!(target: LOG_TARGET, "Added track {} to playlist {}", track_id, playlist_id);
        Ok(())
    }
}
