//! Keyboard commands read from stdin.

use minispot_core::{ActionOutcome, CoreError, PlayerControls, Playlist};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const LOG_TARGET: &str = "minispot::commands";

pub const HELP: &str = "\
Commands:
  n          next track
  p          previous track
  t, space   play / pause
  s <secs>   seek to seconds (or m:ss)
  %<pct>     seek to percent of the track
  l          like current track
  pl         list playlists
  a <n>      add current track to playlist n
  h          this help
  q          quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Next,
    Previous,
    Toggle,
    Seek(Duration),
    SeekFraction(f64),
    Like,
    ListPlaylists,
    /// 1-based index into the last playlist listing
    AddToPlaylist(usize),
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command {0:?} (h for help)")]
    Unknown(String),

    #[error("{command} needs {expected}")]
    BadArgument {
        command: &'static str,
        expected: &'static str,
    },
}

fn bad(command: &'static str, expected: &'static str) -> CommandError {
    CommandError::BadArgument { command, expected }
}

/// Seconds as `90`, `90.5` or `1:30`
fn parse_position(arg: &str) -> Option<Duration> {
    let secs = match arg.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes: u32 = minutes.parse().ok()?;
            let seconds: f64 = seconds.parse().ok()?;
            f64::from(minutes).mul_add(60.0, seconds)
        }
        None => arg.parse().ok()?,
    };
    Duration::try_from_secs_f64(secs).ok()
}

/// Parse one input line. Blank input is `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    // A lone space toggles, so only trim the line ending first
    let line = line.trim_end_matches(['\r', '\n']);
    if line == " " {
        return Ok(Some(Command::Toggle));
    }

    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if let Some(pct) = line.strip_prefix('%') {
        let pct: f64 = pct.trim().parse().map_err(|_| bad("%", "a percentage"))?;
        return Ok(Some(Command::SeekFraction(pct / 100.0)));
    }

    let (name, arg) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(name, arg)| (name, arg.trim()));

    let command = match name {
        "n" => Command::Next,
        "p" => Command::Previous,
        "t" => Command::Toggle,
        "l" => Command::Like,
        "pl" => Command::ListPlaylists,
        "h" | "?" => Command::Help,
        "q" => Command::Quit,
        "s" => Command::Seek(parse_position(arg).ok_or_else(|| bad("s", "a position"))?),
        "a" => Command::AddToPlaylist(
            arg.parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| bad("a", "a playlist number from pl"))?,
        ),
        other => return Err(CommandError::Unknown(other.to_string())),
    };

    Ok(Some(command))
}

fn describe(outcome: &ActionOutcome) -> String {
    match outcome {
        ActionOutcome::Done => "ok".to_string(),
        ActionOutcome::NothingPlaying => "nothing is playing".to_string(),
        ActionOutcome::Unsupported { reason } => format!("not available: {reason}"),
    }
}

/// Runs commands against the backend, remembering the last playlist listing
pub struct CommandRunner {
    controls: PlayerControls,
    playlists: Vec<Playlist>,
}

impl CommandRunner {
    pub const fn new(controls: PlayerControls) -> Self {
        Self {
            controls,
            playlists: Vec::new(),
        }
    }

    /// Execute `command` and return the text to show the user.
    pub async fn execute(&mut self, command: Command) -> Result<String, CoreError> {
        let outcome = match command {
            Command::Next => self.controls.skip_next().await?,
            Command::Previous => self.controls.skip_previous().await?,
            Command::Toggle => self.controls.toggle_play_pause().await?,
            Command::Seek(position) => self.controls.seek_to(position).await?,
            Command::SeekFraction(fraction) => self.controls.seek_to_fraction(fraction).await?,
            Command::Like => self.controls.like_current().await?,
            Command::ListPlaylists => {
                self.playlists = self.controls.list_playlists().await?;
                return Ok(self.playlist_listing());
            }
            Command::AddToPlaylist(number) => {
                let Some(playlist) = number.checked_sub(1).and_then(|i| self.playlists.get(i)) else {
                    return Ok(format!("no playlist {number}; run pl first"));
                };
                let outcome = self.controls.add_current_to_playlist(&playlist.id).await?;
                if outcome == ActionOutcome::Done {
                    return Ok(format!("added to {}", playlist.name));
                }
                outcome
            }
            Command::Help => return Ok(HELP.to_string()),
            Command::Quit => return Ok(String::new()),
        };

        Ok(describe(&outcome))
    }

    fn playlist_listing(&self) -> String {
        if self.playlists.is_empty() {
            return "no playlists".to_string();
        }
        self.playlists
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{:>3}. {}", i + 1, p.name))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Read commands from stdin until `q` or cancellation.
///
/// End of input leaves the display running until Ctrl+C.
pub async fn read_commands(mut runner: CommandRunner, cancel_token: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            () = cancel_token.cancelled() => break,
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!(target: LOG_TARGET, "stdin closed");
                cancel_token.cancelled().await;
                break;
            }
            Err(e) => {
                warn!(target: LOG_TARGET, "Failed to read stdin: {}", e);
                cancel_token.cancelled().await;
                break;
            }
        };

        match parse(&line) {
            Ok(None) => {}
            Ok(Some(Command::Quit)) => {
                cancel_token.cancel();
                break;
            }
            Ok(Some(command)) => match runner.execute(command).await {
                Ok(message) => println!("{message}"),
                Err(e) => println!("failed: {e}"),
            },
            Err(e) => println!("{e}"),
        }
    }
}
