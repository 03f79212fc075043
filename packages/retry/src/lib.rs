#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Retry policy and HTTP send helpers.
//!
//! Outbound HTTP calls go through [`send`] or [`send_json`] with an
//! explicit [`RetryPolicy`] instead of calling
//! `reqwest::RequestBuilder::send()` directly, so every caller decides its
//! own attempt budget while sharing one definition of "transient".
//!
//! # Usage
//!
//! ```ignore
//! use road_guardian_retry::{RetryPolicy, send_json};
//!
//! // POST with JSON body, three retries with 500ms exponential backoff
//! let policy = RetryPolicy::exponential(3, Duration::from_millis(500));
//! let body = send_json(&policy, || client.post(&url).json(&payload)).await?;
//!
//! // Single attempt, no retry
//! let body = send_json(&RetryPolicy::none(), || client.get(&url)).await?;
//! ```

use std::future::Future;
use std::time::Duration;

/// Maximum length of the response body preview kept in status errors.
const BODY_PREVIEW_LEN: usize = 500;

/// Upper bound on a single backoff delay.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Errors from an HTTP exchange.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Status code returned by the server.
        status: u16,
        /// Leading part of the response body.
        body: String,
    },

    /// The body was not valid JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HttpError {
    /// `true` if repeating the same request could plausibly succeed.
    ///
    /// Connection errors, timeouts, HTTP 429, and HTTP 5xx are transient.
    /// Every other 4xx is a client error and is never retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => is_transient(e),
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Json(_) => false,
        }
    }

    /// `true` if the request timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_timeout())
    }
}

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every subsequent retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// A single attempt, never retried.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Exponential backoff: `base_delay`, `2 * base_delay`, `4 * base_delay`, ...
    #[must_use]
    pub const fn exponential(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Total number of attempts this policy allows.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(MAX_DELAY)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(3, Duration::from_millis(500))
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error,
/// or the policy's attempt budget is spent.
///
/// `operation` is called afresh on each attempt; `is_retryable` decides
/// whether an error is worth another try.
///
/// # Errors
///
/// Returns the last error produced by `operation`.
pub async fn run<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    operation: F,
    is_retryable: R,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt >= policy.max_retries || !is_retryable(&e) {
                    return Err(e);
                }
                attempt += 1;
                let delay = policy.delay_for(attempt);
                log::warn!(
                    "  transient error: {e}; retry {attempt}/{} in {delay:?}...",
                    policy.max_retries
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Sends an HTTP request and returns the successful response.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`] (since builders are consumed by
/// `.send()`). Non-2xx responses become [`HttpError::Status`].
///
/// # Errors
///
/// Returns [`HttpError`] if the request fails after all retries or the
/// server returns a non-retryable status code.
#[allow(clippy::future_not_send)]
pub async fn send<F>(policy: &RetryPolicy, build_request: F) -> Result<reqwest::Response, HttpError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let build_request = &build_request;
    run(
        policy,
        move || async move {
            let response = build_request().send().await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            let body = response.text().await.unwrap_or_default();
            Err(HttpError::Status {
                status: status.as_u16(),
                body: preview(&body),
            })
        },
        HttpError::is_retryable,
    )
    .await
}

/// Sends an HTTP request and parses the response body as JSON.
///
/// # Errors
///
/// Returns [`HttpError`] if the request fails after all retries or the
/// body is not valid JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(
    policy: &RetryPolicy,
    build_request: F,
) -> Result<serde_json::Value, HttpError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send(policy, build_request).await?;
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        log::error!(
            "JSON parse failed: {e}\n  received: {} bytes\n  body preview: {}",
            text.len(),
            preview(&text)
        );
        HttpError::Json(e)
    })
}

fn preview(text: &str) -> String {
    if text.len() <= BODY_PREVIEW_LEN {
        return text.to_string();
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Debug)]
    struct Flaky(bool);

    impl std::fmt::Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky(retryable={})", self.0)
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::exponential(10, Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(2));
        assert_eq!(policy.delay_for(40), MAX_DELAY);
        assert_eq!(policy.max_attempts(), 11);
    }

    #[test]
    fn status_classification() {
        let status = |status| HttpError::Status {
            status,
            body: String::new(),
        };
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(!status(422).is_retryable());
    }

    #[tokio::test]
    async fn retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::exponential(3, Duration::ZERO);

        let result: Result<u32, Flaky> = run(
            &policy,
            move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err(Flaky(true)) } else { Ok(n) }
            },
            |e| e.0,
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_on_non_retryable_error() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::exponential(5, Duration::ZERO);

        let result: Result<(), Flaky> = run(
            &policy,
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Flaky(false))
            },
            |e| e.0,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn none_policy_makes_a_single_attempt() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), Flaky> = run(
            &RetryPolicy::none(),
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Flaky(true))
            },
            |e| e.0,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(400);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert!(p.len() <= BODY_PREVIEW_LEN + 3);
    }
}
