//! In-memory backend and provider doubles for unit tests.

use crate::backend::{PlaybackBackend, Playlist};
use crate::error::{CoreError, Result};
use crate::playback::{PlaybackSample, TrackInfo};
use crate::provider::{LyricsProvider, LyricsQuery};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

pub fn playing(name: &str, progress_secs: u64) -> PlaybackSample {
    PlaybackSample::new(
        TrackInfo::new(
            name,
            vec!["Artist".to_string()],
            "Album",
            Duration::from_secs(180),
        )
        .with_id(format!("id-{name}")),
        Duration::from_secs(progress_secs),
        true,
    )
}

/// Scripted backend. Queued playback responses are consumed in order; once
/// the queue is empty, nothing is playing.
#[derive(Default)]
pub struct FakeBackend {
    responses: Mutex<VecDeque<Result<Option<PlaybackSample>>>>,
    auth_error: bool,
    seek_unsupported: bool,
    pub auth_calls: AtomicU32,
    pub playback_calls: AtomicU32,
    pub skips: AtomicU32,
    pub toggles: AtomicU32,
    pub seeks: Mutex<Vec<Duration>>,
    pub liked: Mutex<Vec<String>>,
    pub added: Mutex<Vec<(String, String)>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auth_error(mut self) -> Self {
        self.auth_error = true;
        self
    }

    pub fn with_seek_unsupported(mut self) -> Self {
        self.seek_unsupported = true;
        self
    }

    pub fn push(&self, response: Result<Option<PlaybackSample>>) {
        self.responses.lock().unwrap().push_back(response);
    }
}

#[async_trait]
impl PlaybackBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "Fake"
    }

    async fn authenticate(&self) -> Result<()> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        if self.auth_error {
            return Err(CoreError::AuthenticationFailed {
                reason: "invalid client".into(),
            });
        }
        Ok(())
    }

    async fn current_playback(&self) -> Result<Option<PlaybackSample>> {
        self.playback_calls.fetch_add(1, Ordering::SeqCst);
        self.responses.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }

    async fn skip_next(&self) -> Result<()> {
        self.skips.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn skip_previous(&self) -> Result<()> {
        self.skips.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn toggle_play_pause(&self) -> Result<()> {
        self.toggles.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn seek_to(&self, position: Duration) -> Result<()> {
        if self.seek_unsupported {
            return Err(CoreError::UnsupportedOperation {
                operation: "seek".into(),
                reason: "premium required".into(),
            });
        }
        self.seeks.lock().unwrap().push(position);
        Ok(())
    }

    async fn like_track(&self, track_id: &str) -> Result<()> {
        self.liked.lock().unwrap().push(track_id.to_string());
        Ok(())
    }

    async fn list_playlists(&self) -> Result<Vec<Playlist>> {
        Ok(vec![
            Playlist {
                id: "p1".into(),
                name: "Road Trip".into(),
            },
            Playlist {
                id: "p2".into(),
                name: "Focus".into(),
            },
        ])
    }

    async fn add_track_to_playlist(&self, playlist_id: &str, track_id: &str) -> Result<()> {
        self.added
            .lock()
            .unwrap()
            .push((playlist_id.to_string(), track_id.to_string()));
        Ok(())
    }
}

enum ProviderResponse {
    Found(String),
    NotFound,
    Failing,
}

/// Lyrics provider that always gives the same answer
pub struct FakeProvider {
    response: ProviderResponse,
    pub calls: AtomicU32,
}

impl FakeProvider {
    pub fn found(raw: &str) -> Self {
        Self::with_response(ProviderResponse::Found(raw.to_string()))
    }

    pub fn not_found() -> Self {
        Self::with_response(ProviderResponse::NotFound)
    }

    pub fn failing() -> Self {
        Self::with_response(ProviderResponse::Failing)
    }

    fn with_response(response: ProviderResponse) -> Self {
        Self {
            response,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl LyricsProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "Fake"
    }

    async fn search(&self, _query: &LyricsQuery) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.response {
            ProviderResponse::Found(raw) => Ok(Some(raw.clone())),
            ProviderResponse::NotFound => Ok(None),
            ProviderResponse::Failing => Err(CoreError::LyricsProviderFailed {
                provider: "Fake".into(),
                reason: "connection reset".into(),
            }),
        }
    }
}
