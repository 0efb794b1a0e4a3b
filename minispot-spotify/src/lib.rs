pub mod backend;
pub mod config;
pub mod error;
pub mod oauth;
pub mod paths;

pub use backend::SpotifyBackend;
pub use config::{CONFIG_TEMPLATE as SPOTIFY_CONFIG_TEMPLATE, SpotifyProviderConfig};
pub use error::SpotifyError;
pub use oauth::SpotifyAuth;
pub use paths::SPOTIFY_TOKEN_CACHE_FILE_NAME;
