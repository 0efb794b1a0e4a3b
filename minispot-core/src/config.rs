use crate::error::{CoreError, Result};
use const_format::concatcp;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_BACKOFF_BASE_MS: u64 = 500;
const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;
const DEFAULT_DISPLAY_REFRESH_MS: u64 = 100;
const DEFAULT_CONTEXT_LINES: usize = 1;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinispotConfig {
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Backend-specific sections, e.g. `[providers.spotify]`
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Backend polling and retry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,
    /// Retries per tick on transient backend failures; 0 retries forever
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
}

const fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

const fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

const fn default_backoff_base() -> u64 {
    DEFAULT_BACKOFF_BASE_MS
}

const fn default_backoff_max() -> u64 {
    DEFAULT_BACKOFF_MAX_MS
}

impl PollingConfig {
    /// Poll period, never shorter than 1ms
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base(),
            backoff_max_ms: default_backoff_max(),
        }
    }
}

/// Front-end refresh settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_display_refresh")]
    pub refresh_ms: u64,
    /// Lines shown before and after the current one
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
}

const fn default_display_refresh() -> u64 {
    DEFAULT_DISPLAY_REFRESH_MS
}

const fn default_context_lines() -> usize {
    DEFAULT_CONTEXT_LINES
}

impl DisplayConfig {
    /// Redraw period, never shorter than 1ms
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms.max(1))
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_ms: default_display_refresh(),
            context_lines: default_context_lines(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to `minispot.log` in the config directory
    #[serde(default)]
    pub enabled: bool,
}

/// Raw `[providers.*]` tables, decoded on demand by each backend crate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvidersConfig(toml::Table);

impl ProvidersConfig {
    /// Decode the section for `name`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the section exists but does not match `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.0
            .get(name)
            .map(|value| value.clone().try_into::<T>())
            .transpose()
            .map_err(CoreError::from)
    }
}

impl MinispotConfig {
    /// Get the config file path (~/.config/minispot/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from the default path, or write a template on first run.
    ///
    /// `provider_templates` are appended to the base template so each backend
    /// crate can contribute its own section.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigNotFound`] after creating the template, or an
    /// error if the file cannot be read or parsed.
    pub fn load_or_create(provider_templates: Option<&[&str]>) -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(&config_path, build_config_template(provider_templates))?;
            info!("Wrote config template to {}", config_path.display());

            return Err(CoreError::ConfigNotFound { path: config_path });
        }

        Self::load_from(&config_path)
    }

    /// Load config from an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this structure or a
    /// value fails [`Self::validate`].
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would spin the poll or display loops.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigInvalid`] naming the first zero period.
    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("polling.interval_ms", self.polling.interval_ms),
            ("polling.backoff_base_ms", self.polling.backoff_base_ms),
            ("polling.backoff_max_ms", self.polling.backoff_max_ms),
            ("display.refresh_ms", self.display.refresh_ms),
        ];

        match periods.into_iter().find(|(_, ms)| *ms == 0) {
            Some((field, _)) => Err(CoreError::ConfigInvalid {
                field: field.to_string(),
                reason: "must be greater than 0".into(),
            }),
            None => Ok(()),
        }
    }
}

/// Base config template, without provider sections
pub const BASE_CONFIG_TEMPLATE: &str = concatcp!(
    r#"# minispot configuration
# ~/.config/minispot/config.toml

[polling]
# How often to ask the backend for the current playback state
interval_ms = "#,
    DEFAULT_POLL_INTERVAL_MS,
    r#"
# Retries per poll on network errors (0 = retry forever)
max_retries = "#,
    DEFAULT_MAX_RETRIES,
    r#"
# Exponential backoff between retries
backoff_base_ms = "#,
    DEFAULT_BACKOFF_BASE_MS,
    r#"
backoff_max_ms = "#,
    DEFAULT_BACKOFF_MAX_MS,
    r#"

[display]
# How often the lyric highlight is refreshed
refresh_ms = "#,
    DEFAULT_DISPLAY_REFRESH_MS,
    r#"
# Lines shown before and after the current one
context_lines = "#,
    DEFAULT_CONTEXT_LINES,
    r#"

[logging]
# Also write logs to ~/.config/minispot/minispot.log
enabled = false

"#
);

/// Build the full config template from the base plus provider sections
#[must_use]
pub fn build_config_template(provider_templates: Option<&[&str]>) -> String {
    let mut template = BASE_CONFIG_TEMPLATE.to_string();
    for section in provider_templates.unwrap_or_default() {
        template.push_str(section);
    }
    template
}
