//! `[providers.spotify]` configuration.

use const_format::concatcp;
use minispot_core::{CoreError, ProvidersConfig};
use serde::{Deserialize, Serialize};

/// Provider name used in config file
pub const PROVIDER_NAME: &str = "spotify";

/// Redirect URI registered for the local OAuth callback
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";

/// Spotify app credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyProviderConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_redirect_uri", alias = "oauth_redirect_uri")]
    pub redirect_uri: String,
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.into()
}

impl SpotifyProviderConfig {
    /// Extract Spotify config from the dynamic providers config.
    ///
    /// # Errors
    ///
    /// Returns an error if the section is present but malformed.
    pub fn from_providers(providers: &ProvidersConfig) -> Result<Option<Self>, CoreError> {
        providers.get(PROVIDER_NAME)
    }

    /// Like [`Self::from_providers`], but a missing section is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the section is missing, malformed, or incomplete.
    pub fn require(providers: &ProvidersConfig) -> Result<Self, CoreError> {
        let config = Self::from_providers(providers)?.ok_or_else(|| {
            CoreError::ConfigMissingField {
                field: "providers.spotify".into(),
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate that required fields are present.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or empty.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.client_id.trim().is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "providers.spotify.client_id".into(),
            });
        }
        if self.client_secret.trim().is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "providers.spotify.client_secret".into(),
            });
        }
        Ok(())
    }
}

/// Config template for the Spotify section, appended to the base template.
pub const CONFIG_TEMPLATE: &str = concatcp!(
    r#"[providers.spotify]
# Create an app at https://developer.spotify.com/dashboard and add the
# redirect URI below to its settings
client_id = ""
client_secret = ""
redirect_uri = ""#,
    DEFAULT_REDIRECT_URI,
    "\"\n\n"
);
