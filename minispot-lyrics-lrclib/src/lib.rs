//! LRCLIB lyrics provider.
//!
//! Lookups go from most to least specific: the exact `/get` match on
//! artist, title, album and duration, then `/search` by title filtered to
//! the track duration, then a free-text `/search` for `"title - artist"`.

use async_trait::async_trait;
use minispot_core::{CoreError, LyricsProvider, LyricsQuery};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::Deserialize;
use std::fmt::Write;
use std::time::Duration;
use tracing::{debug, info};

const LRCLIB_API_URL: &str = "https://lrclib.net/api";

const PROVIDER_NAME: &str = "lrclib";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_RETRIES: u32 = 3;

/// Title search hits must be within this many seconds of the track length
const DURATION_TOLERANCE_SECS: f64 = 2.0;

/// Penalty for a record that only has plain lyrics, in seconds of duration mismatch
const PLAIN_ONLY_PENALTY: f64 = 100.0;

/// One LRCLIB record. Fields we do not read are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LrclibRecord {
    id: i64,
    #[serde(default)]
    artist_name: String,
    duration: Option<f64>,
    #[serde(default)]
    instrumental: bool,
    plain_lyrics: Option<String>,
    synced_lyrics: Option<String>,
}

impl LrclibRecord {
    /// Synced text if present, else plain text; instrumentals have none
    fn into_text(self) -> Option<String> {
        if self.instrumental {
            debug!("LRCLIB record {} is instrumental", self.id);
            return None;
        }

        [self.synced_lyrics, self.plain_lyrics]
            .into_iter()
            .flatten()
            .find(|text| !is_blank(text))
    }

    fn has_synced(&self) -> bool {
        self.synced_lyrics.as_deref().is_some_and(|text| !is_blank(text))
    }

    fn has_lyrics(&self) -> bool {
        !self.instrumental
            && (self.has_synced() || self.plain_lyrics.as_deref().is_some_and(|text| !is_blank(text)))
    }

    fn within_tolerance(&self, expected_secs: u32) -> bool {
        self.duration
            .is_some_and(|d| (d - f64::from(expected_secs)).abs() <= DURATION_TOLERANCE_SECS)
    }

    /// Lower is better: synced beats plain, then closer duration wins
    fn rank(&self, expected_secs: Option<u32>) -> f64 {
        let sync_penalty = if self.has_synced() {
            0.0
        } else {
            PLAIN_ONLY_PENALTY
        };
        let duration_gap = match (self.duration, expected_secs) {
            (Some(d), Some(q)) => (d - f64::from(q)).abs(),
            _ => PLAIN_ONLY_PENALTY / 2.0,
        };
        sync_penalty + duration_gap
    }
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Best record with lyrics, if any
fn pick_best(records: Vec<LrclibRecord>, expected_secs: Option<u32>) -> Option<LrclibRecord> {
    records
        .into_iter()
        .filter(LrclibRecord::has_lyrics)
        .min_by(|a, b| a.rank(expected_secs).total_cmp(&b.rank(expected_secs)))
}

/// `key=value&...` with values percent-encoded
fn query_string(params: &[(&str, &str)]) -> String {
    let mut out = String::new();
    for (key, value) in params {
        if !out.is_empty() {
            out.push('&');
        }
        let _ = write!(out, "{key}={}", urlencoding::encode(value));
    }
    out
}

fn exact_url(query: &LyricsQuery) -> String {
    let duration = query.duration_secs.map(|d| d.to_string());
    let mut params = vec![
        ("artist_name", query.artist_name.as_str()),
        ("track_name", query.track_name.as_str()),
    ];
    if let Some(album) = query.album_name.as_deref() {
        params.push(("album_name", album));
    }
    if let Some(duration) = duration.as_deref() {
        params.push(("duration", duration));
    }
    format!("{LRCLIB_API_URL}/get?{}", query_string(&params))
}

fn provider_failed(reason: impl ToString) -> CoreError {
    CoreError::LyricsProviderFailed {
        provider: PROVIDER_NAME.to_string(),
        reason: reason.to_string(),
    }
}

/// LRCLIB.net lyrics provider
pub struct LrclibProvider {
    client: ClientWithMiddleware,
}

impl LrclibProvider {
    /// Create a provider with request timeouts and retrying transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, CoreError> {
        let base_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("minispot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(MAX_RETRIES);
        let client = ClientBuilder::new(base_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { client })
    }

    /// GET `url`; `Ok(None)` on 404.
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<Option<T>, CoreError> {
        debug!("LRCLIB GET {}", url);
        let response = self.client.get(url).send().await.map_err(provider_failed)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(provider_failed(format!("status {status}")));
        }

        Ok(Some(response.json().await?))
    }

    async fn search_records(&self, params: &[(&str, &str)]) -> Result<Vec<LrclibRecord>, CoreError> {
        let url = format!("{LRCLIB_API_URL}/search?{}", query_string(params));
        Ok(self.get_json(&url).await?.unwrap_or_default())
    }

    async fn by_title_and_duration(&self, query: &LyricsQuery) -> Result<Option<LrclibRecord>, CoreError> {
        let records = self
            .search_records(&[("track_name", query.track_name.as_str())])
            .await?;

        let records = match query.duration_secs {
            Some(expected) => records
                .into_iter()
                .filter(|r| r.within_tolerance(expected))
                .collect(),
            None => records,
        };

        Ok(pick_best(records, query.duration_secs))
    }

    async fn by_free_text(&self, query: &LyricsQuery) -> Result<Option<LrclibRecord>, CoreError> {
        let q = query.search_string();
        let records = self.search_records(&[("q", q.as_str())]).await?;
        Ok(pick_best(records, query.duration_secs))
    }
}

#[async_trait]
impl LyricsProvider for LrclibProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn search(&self, query: &LyricsQuery) -> Result<Option<String>, CoreError> {
        info!(
            "Looking up lyrics on LRCLIB: {} (duration: {:?}s)",
            query.search_string(),
            query.duration_secs
        );

        let exact: Option<LrclibRecord> = self.get_json(&exact_url(query)).await?;
        if let Some(record) = exact {
            debug!("LRCLIB exact match {} by {}", record.id, record.artist_name);
            return Ok(record.into_text());
        }

        if let Some(record) = self.by_title_and_duration(query).await? {
            debug!("LRCLIB title match {} by {}", record.id, record.artist_name);
            return Ok(record.into_text());
        }

        let found = self.by_free_text(query).await?;
        if let Some(record) = &found {
            debug!("LRCLIB free-text match {} by {}", record.id, record.artist_name);
        }
        Ok(found.and_then(LrclibRecord::into_text))
    }
}
