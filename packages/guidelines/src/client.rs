//! HTTP client for the guideline service.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use road_guardian_retry::{RetryPolicy, send_json};
use serde::Deserialize;
use sha2::{Digest as _, Sha256};

use crate::GuidelinesError;
use crate::models::{GuidelinesInput, GuidelinesResponse};

fn default_base_url() -> String {
    "http://localhost:8001".to_string()
}

const fn default_timeout_secs() -> u64 {
    10
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_cache_enabled() -> bool {
    true
}

/// Connection settings for the guideline service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GuidelinesConfig {
    /// Service root, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Total attempts per call, first try included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Whether successful predictions are memoized.
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,
}

impl Default for GuidelinesConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            cache_enabled: default_cache_enabled(),
        }
    }
}

/// Client for `/predict` and `/protocols`.
///
/// Predictions are cached in memory for the lifetime of the client, keyed
/// by a hash of the request body. Only successful responses are cached.
#[derive(Debug)]
pub struct GuidelinesClient {
    client: reqwest::Client,
    config: GuidelinesConfig,
    retry: RetryPolicy,
    cache: Mutex<BTreeMap<String, GuidelinesResponse>>,
}

impl GuidelinesClient {
    /// Creates a client with exponential backoff over
    /// `config.max_attempts` attempts.
    ///
    /// # Errors
    ///
    /// Returns [`GuidelinesError::Http`] if the HTTP client cannot be built.
    pub fn new(config: GuidelinesConfig) -> Result<Self, GuidelinesError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("road-guardian/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(road_guardian_retry::HttpError::from)?;

        let retry = RetryPolicy::exponential(
            config.max_attempts.saturating_sub(1),
            Duration::from_millis(500),
        );

        Ok(Self {
            client,
            config,
            retry,
            cache: Mutex::new(BTreeMap::new()),
        })
    }

    /// Replaces the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Cache key for `input`: hex SHA-256 of its JSON encoding.
    ///
    /// # Errors
    ///
    /// Returns [`GuidelinesError::Json`] if `input` cannot be serialized.
    pub fn cache_key(input: &GuidelinesInput) -> Result<String, GuidelinesError> {
        let body = serde_json::to_string(input)?;
        Ok(hex::encode(Sha256::digest(body.as_bytes())))
    }

    fn cached(&self, key: &str) -> Option<GuidelinesResponse> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Requests behavioural guidelines for an incident.
    ///
    /// # Errors
    ///
    /// Returns [`GuidelinesError::Http`] if the service is unreachable after
    /// all attempts or answers with an error status (4xx responses are not
    /// retried), or [`GuidelinesError::Json`] if the body does not match
    /// the expected shape.
    pub async fn get_guidelines(
        &self,
        input: &GuidelinesInput,
    ) -> Result<Vec<String>, GuidelinesError> {
        let key = Self::cache_key(input)?;
        if self.config.cache_enabled {
            if let Some(hit) = self.cached(&key) {
                log::debug!("guidelines cache hit {key}");
                return Ok(hit.guidelines);
            }
        }

        let url = self.url("predict");
        log::debug!("POST {url}");
        let body = send_json(&self.retry, || self.client.post(&url).json(input)).await?;
        let response: GuidelinesResponse = serde_json::from_value(body)?;
        log::info!("received {} guidelines", response.guidelines.len());

        if self.config.cache_enabled {
            self.cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key, response.clone());
        }
        Ok(response.guidelines)
    }

    /// Fetches the protocol catalogue the service knows about.
    ///
    /// # Errors
    ///
    /// Returns [`GuidelinesError::Http`] on transport failure, error status,
    /// or an unparseable body.
    pub async fn get_protocols(&self) -> Result<serde_json::Value, GuidelinesError> {
        let url = self.url("protocols");
        log::debug!("GET {url}");
        Ok(send_json(&self.retry, || self.client.get(&url)).await?)
    }

    /// Drops every cached prediction.
    pub fn clear_cache(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        log::debug!("guidelines cache cleared");
    }

    /// Number of cached predictions.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
