mod commands;
mod display;

use crate::commands::{CommandRunner, HELP, read_commands};
use crate::display::{run_display, watch_session_events};
use minispot_core::{
    CoreError, LyricsProvider, MinispotConfig, PlaybackBackend, PlayerControls, PollLoop,
    PollState, Session,
};
use minispot_lyrics_lrclib::LrclibProvider;
use minispot_spotify::{SPOTIFY_CONFIG_TEMPLATE, SpotifyAuth, SpotifyBackend, SpotifyProviderConfig};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    let file_logging_enabled = check_file_logging_enabled();
    init_tracing(file_logging_enabled);

    let provider_templates: &[&str] = &[SPOTIFY_CONFIG_TEMPLATE];
    let config = match MinispotConfig::load_or_create(Some(provider_templates)) {
        Ok(config) => config,
        Err(CoreError::ConfigNotFound { path }) => {
            print_new_config_notice(&path);
            std::process::exit(0);
        }
        Err(CoreError::ConfigParseError(parse_error)) => {
            eprintln!(
                "Config file {} has a syntax error:\n{parse_error}",
                MinispotConfig::config_path().display()
            );
            std::process::exit(1);
        }
        Err(e @ CoreError::ConfigInvalid { .. }) => {
            eprintln!("{e}\n\nEdit {}", MinispotConfig::config_path().display());
            std::process::exit(1);
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let spotify_config = match SpotifyProviderConfig::require(&config.providers) {
        Ok(spotify_config) => spotify_config,
        Err(e) => {
            eprintln!(
                "{e}\n\nEdit {} and fill in [providers.spotify].\n\
                Get credentials from https://developer.spotify.com/dashboard",
                MinispotConfig::config_path().display()
            );
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    let cancel_token = CancellationToken::new();

    let ctrlc_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }

    let code = runtime.block_on(run(config, &spotify_config, cancel_token));

    // stdin reads may still be parked on a blocking thread
    runtime.shutdown_background();
    std::process::exit(code);
}

/// Wire the backend, lyrics provider and front-end together; returns the exit code.
async fn run(
    config: MinispotConfig,
    spotify_config: &SpotifyProviderConfig,
    cancel_token: CancellationToken,
) -> i32 {
    let provider: Arc<dyn LyricsProvider> = match LrclibProvider::new() {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            error!("Failed to create LRCLIB provider: {}", e);
            return 1;
        }
    };

    let auth = Arc::new(SpotifyAuth::new(spotify_config));
    let backend: Arc<dyn PlaybackBackend> = Arc::new(SpotifyBackend::new(auth));
    let session = Session::new();

    let poller = Arc::new(
        PollLoop::new(
            Arc::clone(&backend),
            provider,
            Arc::clone(&session),
            &config.polling,
        )
        .with_cancel_token(cancel_token.clone()),
    );

    let events = session.subscribe();
    tokio::spawn(watch_session_events(events, cancel_token.clone()));

    info!(
        "Starting Spotify poller (interval: {}ms)",
        config.polling.interval_ms
    );
    let poll_handle = poller.start();

    tokio::spawn(run_display(
        Arc::clone(&session),
        config.display,
        cancel_token.clone(),
    ));

    println!("{HELP}\n");
    let runner = CommandRunner::new(PlayerControls::new(backend));
    read_commands(runner, cancel_token.clone()).await;

    cancel_token.cancel();
    if let Err(e) = poll_handle.await {
        error!("Poller task failed: {}", e);
        return 1;
    }

    if session.state().await == PollState::Unauthenticated {
        1
    } else {
        0
    }
}

fn print_new_config_notice(config_path: &Path) {
    println!(
        "A configuration file has been created at {}.\n\n\
        Edit it with your Spotify credentials:\n  \
        providers.spotify.client_id\n  \
        providers.spotify.client_secret\n\n\
        Get these from https://developer.spotify.com/dashboard and run minispot again.",
        config_path.display()
    );
}

/// Check if file logging is enabled by reading the config file.
/// This is done before full config loading to set up tracing first.
/// Returns `false` if config doesn't exist or can't be parsed.
fn check_file_logging_enabled() -> bool {
    #[derive(serde::Deserialize)]
    struct PartialConfig {
        #[serde(default)]
        logging: PartialLoggingConfig,
    }
    #[derive(serde::Deserialize, Default)]
    struct PartialLoggingConfig {
        #[serde(default)]
        enabled: bool,
    }

    let Ok(content) = std::fs::read_to_string(MinispotConfig::config_path()) else {
        return false;
    };

    toml::from_str::<PartialConfig>(&content)
        .map(|c| c.logging.enabled)
        .unwrap_or(false)
}

/// Console logs go to stderr so they stay out of the lyric stream on stdout
fn init_tracing(file_logging_enabled: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,minispot=info,rspotify_http=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if file_logging_enabled {
        let log_path = minispot_core::log_file_path();

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match File::create(&log_path) {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .with(file_layer)
                    .init();

                return;
            }
            Err(e) => {
                eprintln!("Failed to create log file at {}: {e}", log_path.display());
            }
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
