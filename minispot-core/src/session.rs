//! State shared between the poll loop and the display.
//!
//! The poll loop is the only writer. The track, its lyric document and the
//! clock anchor are replaced together under one write guard, so a reader
//! never sees a document from one track paired with an anchor from another.
//! Readers take a [`SessionSnapshot`] and do all projection on that copy.

use crate::clock::PlaybackClock;
use crate::lyrics::{LyricDocument, LyricLine};
use crate::playback::{PlaybackSample, TrackInfo};
use crate::poller::PollState;
use crate::time::DurationExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, broadcast};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Events emitted as the session changes
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A different track started; lyrics for it are already in place
    TrackChanged { track: TrackInfo },
    /// Lyrics were resolved for the current track
    LyricsLoaded { synced: bool },
    /// The backend reports no active playback
    NothingPlaying,
    /// A tick failed after retries; polling continues
    PollFailed { message: String },
    /// Polling stopped for good
    Halted { reason: String },
}

struct SessionInner {
    track: Option<TrackInfo>,
    document: Arc<LyricDocument>,
    clock: PlaybackClock,
    is_playing: bool,
    state: PollState,
}

/// Owner of the current track context
pub struct Session {
    inner: RwLock<SessionInner>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl Session {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Consistent copy of the current state
    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.read().await;
        SessionSnapshot {
            track: inner.track.clone(),
            document: Arc::clone(&inner.document),
            clock: inner.clock,
            is_playing: inner.is_playing,
            state: inner.state,
        }
    }

    pub async fn current_track(&self) -> Option<TrackInfo> {
        self.inner.read().await.track.clone()
    }

    pub async fn state(&self) -> PollState {
        self.inner.read().await.state
    }

    /// Re-anchor the clock for the track already held.
    pub async fn apply_sample(&self, sample: &PlaybackSample, observed_at: Instant) {
        let mut inner = self.inner.write().await;
        inner.clock.anchor(sample.progress, observed_at);
        inner.is_playing = sample.is_playing;
        inner.state = PollState::Polling;
    }

    /// Swap in a new track with its document and anchor.
    pub async fn replace_track(
        &self,
        sample: PlaybackSample,
        document: Arc<LyricDocument>,
        observed_at: Instant,
    ) {
        let synced = document.is_synced();
        let track = sample.track.clone();
        {
            let mut inner = self.inner.write().await;
            inner.track = Some(sample.track);
            inner.document = document;
            inner.clock = PlaybackClock::new(sample.progress, observed_at);
            inner.is_playing = sample.is_playing;
            inner.state = PollState::Polling;
        }

        self.emit(SessionEvent::TrackChanged { track });
        self.emit(SessionEvent::LyricsLoaded { synced });
    }

    /// Record that nothing is playing.
    ///
    /// The last track and its document are kept so resuming the same track
    /// does not fetch lyrics again. The projected position freezes.
    pub async fn set_nothing_playing(&self) {
        {
            let mut inner = self.inner.write().await;
            inner.is_playing = false;
            inner.state = PollState::NoActiveSession;
        }
        self.emit(SessionEvent::NothingPlaying);
    }

    pub async fn set_state(&self, state: PollState) {
        self.inner.write().await.state = state;
    }

    /// Emit an event; having no subscribers is not an error.
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl Default for Session {
    fn default() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: RwLock::new(SessionInner {
                track: None,
                document: Arc::new(LyricDocument::placeholder()),
                clock: PlaybackClock::default(),
                is_playing: false,
                state: PollState::Idle,
            }),
            event_tx,
        }
    }
}

/// Read-only view of the session at one moment
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub track: Option<TrackInfo>,
    pub document: Arc<LyricDocument>,
    pub clock: PlaybackClock,
    pub is_playing: bool,
    pub state: PollState,
}

impl SessionSnapshot {
    fn track_duration(&self) -> Duration {
        self.track.as_ref().map_or(Duration::ZERO, |t| t.duration)
    }

    /// Virtual playback time at `at`, frozen while paused
    #[must_use]
    pub fn position_at(&self, at: Instant) -> Duration {
        let duration = self.track_duration();
        if self.is_playing {
            self.clock.virtual_time_clamped(at, duration)
        } else if duration.is_zero() {
            self.clock.anchor_progress()
        } else {
            self.clock.anchor_progress().min(duration)
        }
    }

    #[must_use]
    pub fn position(&self) -> Duration {
        self.position_at(Instant::now())
    }

    #[must_use]
    pub fn current_index_at(&self, at: Instant) -> usize {
        self.document.index_at(self.position_at(at))
    }

    #[must_use]
    pub fn current_line_at(&self, at: Instant) -> &str {
        self.document.line_at(self.position_at(at))
    }

    #[must_use]
    pub fn current_line(&self) -> &str {
        self.current_line_at(Instant::now())
    }

    /// Lines around the current one for a scrolling view
    #[must_use]
    pub fn visible_lines_at(&self, at: Instant, before: usize, after: usize) -> &[LyricLine] {
        self.document
            .visible_lines(self.position_at(at), before, after)
    }

    /// Progress ratio for a progress bar; 0 when the duration is unknown
    #[must_use]
    pub fn playback_fraction_at(&self, at: Instant) -> f64 {
        self.position_at(at).fraction_of(self.track_duration())
    }

    /// Whether a track is loaded and the backend reported it recently
    #[must_use]
    pub fn has_track(&self) -> bool {
        self.track.is_some() && self.state != PollState::NoActiveSession
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LRC: &str = "[00:00.00]Intro\n[00:10.00]Verse\n[00:20.00]Chorus\n";

    fn sample(name: &str, progress_secs: u64, is_playing: bool) -> PlaybackSample {
        PlaybackSample::new(
            TrackInfo::new(
                name,
                vec!["Artist".to_string()],
                "Album",
                Duration::from_secs(30),
            ),
            Duration::from_secs(progress_secs),
            is_playing,
        )
    }

    #[tokio::test]
    async fn test_new_session_is_idle_placeholder() {
        let session = Session::new();
        let snapshot = session.snapshot().await;

        assert_eq!(snapshot.state, PollState::Idle);
        assert!(snapshot.track.is_none());
        assert!(!snapshot.document.is_synced());
        assert!(!snapshot.has_track());
    }

    #[tokio::test]
    async fn test_replace_track_swaps_everything_and_emits() {
        let session = Session::new();
        let mut events = session.subscribe();
        let document = Arc::new(LyricDocument::parse(Some(LRC)));
        let t0 = Instant::now();

        session
            .replace_track(sample("Song", 10, true), Arc::clone(&document), t0)
            .await;

        let snapshot = session.snapshot().await;
        assert!(Arc::ptr_eq(&snapshot.document, &document));
        assert_eq!(snapshot.clock.anchor_progress(), Duration::from_secs(10));
        assert_eq!(snapshot.state, PollState::Polling);
        assert_eq!(snapshot.current_line_at(t0), "Verse");
        assert_eq!(
            snapshot.current_line_at(t0 + Duration::from_secs(11)),
            "Chorus"
        );

        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::TrackChanged { track } if track.name == "Song"
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::LyricsLoaded { synced: true }
        ));
    }

    #[tokio::test]
    async fn test_apply_sample_keeps_document() {
        let session = Session::new();
        let document = Arc::new(LyricDocument::parse(Some(LRC)));
        let t0 = Instant::now();
        session
            .replace_track(sample("Song", 0, true), Arc::clone(&document), t0)
            .await;

        session.apply_sample(&sample("Song", 21, true), t0).await;

        let snapshot = session.snapshot().await;
        assert!(Arc::ptr_eq(&snapshot.document, &document));
        assert_eq!(snapshot.current_line_at(t0), "Chorus");
    }

    #[tokio::test]
    async fn test_paused_position_is_frozen() {
        let session = Session::new();
        let t0 = Instant::now();
        session
            .replace_track(
                sample("Song", 12, false),
                Arc::new(LyricDocument::parse(Some(LRC))),
                t0,
            )
            .await;

        let snapshot = session.snapshot().await;
        assert_eq!(
            snapshot.position_at(t0 + Duration::from_secs(5)),
            Duration::from_secs(12)
        );
        assert_eq!(snapshot.current_line_at(t0 + Duration::from_secs(60)), "Verse");
    }

    #[tokio::test]
    async fn test_position_clamped_to_duration() {
        let session = Session::new();
        let t0 = Instant::now();
        session
            .replace_track(
                sample("Song", 25, true),
                Arc::new(LyricDocument::placeholder()),
                t0,
            )
            .await;

        let snapshot = session.snapshot().await;
        assert_eq!(
            snapshot.position_at(t0 + Duration::from_secs(60)),
            Duration::from_secs(30)
        );
        assert!((snapshot.playback_fraction_at(t0 + Duration::from_secs(60)) - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_nothing_playing_keeps_track() {
        let session = Session::new();
        let mut events = session.subscribe();
        session
            .replace_track(
                sample("Song", 0, true),
                Arc::new(LyricDocument::placeholder()),
                Instant::now(),
            )
            .await;

        session.set_nothing_playing().await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.state, PollState::NoActiveSession);
        assert!(!snapshot.is_playing);
        assert!(snapshot.track.is_some());
        assert!(!snapshot.has_track());

        // TrackChanged, LyricsLoaded, then NothingPlaying
        events.recv().await.unwrap();
        events.recv().await.unwrap();
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::NothingPlaying
        ));
    }

    #[tokio::test]
    async fn test_visible_lines_window() {
        let session = Session::new();
        let t0 = Instant::now();
        session
            .replace_track(
                sample("Song", 10, false),
                Arc::new(LyricDocument::parse(Some(LRC))),
                t0,
            )
            .await;

        let snapshot = session.snapshot().await;
        let texts: Vec<&str> = snapshot
            .visible_lines_at(t0, 1, 1)
            .iter()
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(texts, vec!["Intro", "Verse", "Chorus"]);
    }
}
