//! Terminal lyric display driven by session snapshots.

use minispot_core::{
    DisplayConfig, DurationExt, LyricDocument, PollState, Session, SessionEvent, SessionSnapshot,
};
use std::fmt::Write;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const LOG_TARGET: &str = "minispot::display";

/// Turns snapshots into text, emitting only when something visible changed
pub struct LyricView {
    context_lines: usize,
    document: Option<Arc<LyricDocument>>,
    index: Option<usize>,
    idle: bool,
}

impl LyricView {
    pub const fn new(context_lines: usize) -> Self {
        Self {
            context_lines,
            document: None,
            index: None,
            idle: false,
        }
    }

    /// Text to print for `snapshot` at `at`, or `None` if nothing changed.
    pub fn render(&mut self, snapshot: &SessionSnapshot, at: Instant) -> Option<String> {
        let Some(track) = snapshot.track.as_ref().filter(|_| snapshot.has_track()) else {
            return self.render_idle(snapshot.state);
        };
        self.idle = false;

        let mut out = String::new();
        let is_new = !self
            .document
            .as_ref()
            .is_some_and(|doc| Arc::ptr_eq(doc, &snapshot.document));

        if is_new {
            self.document = Some(Arc::clone(&snapshot.document));
            self.index = None;
            let _ = writeln!(
                out,
                "\n♪ {} - {} ({}) [{}]",
                track.name,
                track.artist_display(),
                track.album,
                track.duration.format_clock()
            );

            if !snapshot.document.is_synced() {
                let _ = writeln!(out, "{}", snapshot.document);
                return Some(out);
            }
        } else if !snapshot.document.is_synced() {
            return None;
        }

        let index = snapshot.current_index_at(at);
        if self.index == Some(index) {
            return None;
        }
        self.index = Some(index);

        let position = snapshot.position_at(at);
        let percent = snapshot.playback_fraction_at(at) * 100.0;
        let first = index.saturating_sub(self.context_lines);
        for (offset, line) in snapshot
            .visible_lines_at(at, self.context_lines, self.context_lines)
            .iter()
            .enumerate()
        {
            if first + offset == index {
                let _ = writeln!(
                    out,
                    "> [{} {percent:.0}%] {}",
                    position.format_clock(),
                    line.text
                );
            } else {
                let _ = writeln!(out, "              {}", line.text);
            }
        }

        Some(out)
    }

    fn render_idle(&mut self, state: PollState) -> Option<String> {
        if state != PollState::NoActiveSession || self.idle {
            return None;
        }
        self.idle = true;
        self.document = None;
        self.index = None;
        Some("Nothing playing on Spotify\n".to_string())
    }
}

/// Redraw the lyrics at the configured refresh rate until cancelled.
pub async fn run_display(
    session: Arc<Session>,
    config: DisplayConfig,
    cancel_token: CancellationToken,
) {
    let mut view = LyricView::new(config.context_lines);
    let mut ticker = tokio::time::interval(config.refresh_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                let snapshot = session.snapshot().await;
                if let Some(text) = view.render(&snapshot, Instant::now()) {
                    print!("{text}");
                }
            }
        }
    }
}

/// Log session events; a halted poller shuts the app down.
///
/// Takes the receiver rather than the session so callers can subscribe before
/// the poller starts.
pub async fn watch_session_events(
    mut rx: broadcast::Receiver<SessionEvent>,
    cancel_token: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            () = cancel_token.cancelled() => break,
            event = rx.recv() => event,
        };

        match event {
            Ok(SessionEvent::TrackChanged { track }) => {
                info!(target: LOG_TARGET, "Now playing: {} - {}", track.name, track.artist_display());
            }
            Ok(SessionEvent::LyricsLoaded { synced }) => {
                info!(target: LOG_TARGET, "Lyrics ready (synced: {})", synced);
            }
            Ok(SessionEvent::NothingPlaying) => {}
            Ok(SessionEvent::PollFailed { message }) => {
                warn!(target: LOG_TARGET, "Spotify poll failed: {}", message);
            }
            Ok(SessionEvent::Halted { reason }) => {
                error!(target: LOG_TARGET, "Stopped talking to Spotify: {}", reason);
                eprintln!("Spotify login failed: {reason}\nCheck your credentials, then restart minispot to log in again.");
                cancel_token.cancel();
                break;
            }
            Err(RecvError::Closed) => break,
            Err(RecvError::Lagged(n)) => {
                info!(target: LOG_TARGET, "Missed {} session events", n);
            }
        }
    }
}
