use crate::error::CoreError;
use async_trait::async_trait;

/// Query parameters for fetching lyrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricsQuery {
    /// Track name
    pub track_name: String,
    /// Primary artist name
    pub artist_name: String,
    /// Album name (optional)
    pub album_name: Option<String>,
    /// Track duration in seconds (for matching)
    pub duration_secs: Option<u32>,
}

impl LyricsQuery {
    /// Create a new lyrics query
    pub fn new(track_name: impl Into<String>, artist_name: impl Into<String>) -> Self {
        Self {
            track_name: track_name.into(),
            artist_name: artist_name.into(),
            album_name: None,
            duration_secs: None,
        }
    }

    /// Set album name
    #[must_use]
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album_name = Some(album.into());
        self
    }

    /// Set duration
    #[must_use]
    pub const fn with_duration(mut self, duration_secs: u32) -> Self {
        self.duration_secs = Some(duration_secs);
        self
    }

    /// Free-text search string in `"title - artist"` form
    #[must_use]
    pub fn search_string(&self) -> String {
        format!("{} - {}", self.track_name, self.artist_name)
    }
}

/// Source of raw lyric text.
///
/// Providers return whatever text they found, synced (LRC) or plain, and
/// leave parsing to [`LyricDocument`](crate::LyricDocument). `Ok(None)` means
/// nothing matched; errors are reserved for transport or service failures.
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Search for raw lyric text matching the query
    async fn search(&self, query: &LyricsQuery) -> Result<Option<String>, CoreError>;
}
