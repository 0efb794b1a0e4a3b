//! Virtual playback time between backend polls.
//!
//! The backend is polled every second or two, but the lyric highlight has to
//! move at display rate. [`PlaybackClock`] remembers the last reported
//! progress together with the wall-clock instant it was observed at, and
//! projects forward from there.

use std::time::{Duration, Instant};

/// Last known progress sample plus the instant it was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackClock {
    anchor_progress: Duration,
    anchor_wall_time: Instant,
}

impl PlaybackClock {
    #[must_use]
    pub const fn new(progress: Duration, at: Instant) -> Self {
        Self {
            anchor_progress: progress,
            anchor_wall_time: at,
        }
    }

    /// Replace the anchor pair.
    pub fn anchor(&mut self, progress: Duration, at: Instant) {
        self.anchor_progress = progress;
        self.anchor_wall_time = at;
    }

    /// Anchor progress plus the wall time elapsed since anchoring.
    ///
    /// Not clamped: the projection keeps running past the end of the track
    /// and through pauses. Use [`Self::virtual_time_clamped`] before lookups.
    /// Instants earlier than the anchor project to the anchor itself.
    #[must_use]
    pub fn virtual_time(&self, at: Instant) -> Duration {
        self.anchor_progress
            .saturating_add(at.saturating_duration_since(self.anchor_wall_time))
    }

    /// [`Self::virtual_time`] clamped to `[0, duration]`.
    ///
    /// A zero `duration` means the length is unknown and leaves the
    /// projection unclamped.
    #[must_use]
    pub fn virtual_time_clamped(&self, at: Instant, duration: Duration) -> Duration {
        let projected = self.virtual_time(at);
        if duration.is_zero() {
            projected
        } else {
            projected.min(duration)
        }
    }

    #[must_use]
    pub const fn anchor_progress(&self) -> Duration {
        self.anchor_progress
    }

    #[must_use]
    pub const fn anchor_wall_time(&self) -> Instant {
        self.anchor_wall_time
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new(Duration::ZERO, Instant::now())
    }
}
