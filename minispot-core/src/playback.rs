use crate::provider::LyricsQuery;
use crate::time::DurationExt;
use std::time::Duration;

/// Artist name used when the backend reports a track without artists
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Information about the currently playing track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    /// Backend track ID (absent for local files)
    pub id: Option<String>,
    /// Track name
    pub name: String,
    /// Artist names, primary artist first
    pub artists: Vec<String>,
    /// Album name
    pub album: String,
    /// Track duration
    pub duration: Duration,
}

impl TrackInfo {
    /// Create a new track info without an ID
    pub fn new(
        name: impl Into<String>,
        artists: Vec<String>,
        album: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            artists,
            album: album.into(),
            duration,
        }
    }

    /// Set the backend track ID
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// First listed artist
    #[must_use]
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map_or(UNKNOWN_ARTIST, String::as_str)
    }

    /// All artists joined for display
    #[must_use]
    pub fn artist_display(&self) -> String {
        if self.artists.is_empty() {
            return UNKNOWN_ARTIST.to_string();
        }
        self.artists.join(", ")
    }

    /// Identity used to decide whether the track changed between polls
    #[must_use]
    pub fn identity(&self) -> TrackIdentity {
        TrackIdentity {
            id: self.id.clone(),
            title: self.name.clone(),
            artist: self.primary_artist().to_string(),
        }
    }

    /// Query handed to the lyrics provider for this track
    #[must_use]
    pub fn lyrics_query(&self) -> LyricsQuery {
        LyricsQuery::new(&self.name, self.primary_artist())
            .with_album(&self.album)
            .with_duration(self.duration.as_secs_u32())
    }
}

/// Proxy for "same track" across polls.
///
/// Stable IDs win when both sides have one; otherwise title and primary
/// artist together decide, so two different songs sharing a title are not
/// mistaken for each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackIdentity {
    pub id: Option<String>,
    pub title: String,
    pub artist: String,
}

impl TrackIdentity {
    #[must_use]
    pub fn is_same_track(&self, other: &Self) -> bool {
        match (&self.id, &other.id) {
            (Some(a), Some(b)) => a == b,
            _ => self.title == other.title && self.artist == other.artist,
        }
    }
}

/// Point-in-time playback snapshot from the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSample {
    /// Track being played
    pub track: TrackInfo,
    /// Reported progress into the track
    pub progress: Duration,
    /// Whether the track is playing (false when paused)
    pub is_playing: bool,
}

impl PlaybackSample {
    #[must_use]
    pub const fn new(track: TrackInfo, progress: Duration, is_playing: bool) -> Self {
        Self {
            track,
            progress,
            is_playing,
        }
    }

    /// Check whether this sample belongs to a different track than `previous`
    #[must_use]
    pub fn track_changed(&self, previous: Option<&TrackInfo>) -> bool {
        previous.is_none_or(|previous| {
            !previous.identity().is_same_track(&self.track.identity())
        })
    }
}
