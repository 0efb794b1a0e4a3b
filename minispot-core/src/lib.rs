pub mod actions;
pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod lyrics;
pub mod paths;
pub mod playback;
pub mod poller;
pub mod provider;
pub mod retry;
pub mod session;
pub mod sync;
pub mod time;

#[cfg(test)]
mod test_support;

pub use actions::{ActionOutcome, PlayerControls};
pub use backend::{PlaybackBackend, Playlist};
pub use clock::PlaybackClock;
pub use config::{
    build_config_template, DisplayConfig, LoggingConfig, MinispotConfig, PollingConfig,
    ProvidersConfig, BASE_CONFIG_TEMPLATE,
};

pub use error::CoreError;
pub use lyrics::{LyricDocument, LyricLine, NO_LYRICS_PLACEHOLDER};
pub use paths::{
    config_dir, config_path, log_file_path, CONFIG_DIR_NAME, CONFIG_FILE_NAME, LOG_FILE_NAME,
};
pub use playback::{PlaybackSample, TrackIdentity, TrackInfo, UNKNOWN_ARTIST};
pub use poller::{PollLoop, PollState, TickOutcome};
pub use provider::{LyricsProvider, LyricsQuery};
pub use retry::{retry_transient, RetryPolicy};
pub use session::{Session, SessionEvent, SessionSnapshot};
pub use time::DurationExt;
