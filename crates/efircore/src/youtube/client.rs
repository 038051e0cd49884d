//! Quota-aware client for the YouTube Data API.
//!
//! Owns an ordered pool of API keys and a bounded retry policy. Transport
//! errors are retried with exponential backoff; a 403 whose error body
//! names a quota reason advances the key cursor and restarts the attempt
//! loop on the next key. Any other non-2xx status fails the call outright.
//!
//! The cursor is the only shared mutable state; it is guarded by a
//! `std::sync::Mutex` held only for the in-memory read/advance, never
//! across an await.

use crate::core::{config, metrics, AppError, AppResult};
use reqwest::StatusCode;
use serde_json::Value as JsonValue;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

/// Base URL of the YouTube Data API v3.
const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// 403 reasons that mean "this key is spent" rather than "this request is
/// wrong". Anything else is a hard failure.
const QUOTA_REASONS: [&str; 4] = [
    "quotaExceeded",
    "dailyLimitExceeded",
    "rateLimitExceeded",
    "keyInvalid",
];

/// Errors from a single Data API call.
///
/// `KeysExhausted` and `RetriesExhausted` are the "unavailable" outcomes:
/// callers treat them as "status unknown this cycle", not as faults.
#[derive(Debug, Error)]
pub enum ApiCallError {
    /// Every key was rejected with a quota reason within one call
    #[error("all {0} API key(s) rejected by quota")]
    KeysExhausted(usize),

    /// Transport kept failing past the attempt ceiling
    #[error("gave up after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    /// Hard, non-retryable HTTP status (including a 403 without a
    /// recognized quota reason)
    #[error("request failed with status {0}")]
    Status(StatusCode),

    /// 2xx response whose body could not be decoded
    #[error("failed to decode response body: {0}")]
    Body(#[source] reqwest::Error),
}

/// Retry configuration for transport errors, per API key.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per key before the call gives up
    pub attempts: u32,
    /// Delay before the second attempt; doubles each attempt after that
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: config::youtube::RETRY_ATTEMPTS,
            base_delay: config::youtube::base_delay(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the given 0-based failed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Classification of one HTTP attempt; drives the call state machine.
enum Step {
    Success(JsonValue),
    RetryTransient(reqwest::Error),
    RotateKey,
    Hard(ApiCallError),
}

/// Resilient Data API client with a rotating key pool.
pub struct YoutubeApi {
    http: reqwest::Client,
    api_base: String,
    keys: Vec<String>,
    cursor: Mutex<usize>,
    retry: RetryPolicy,
}

impl YoutubeApi {
    /// Creates a client over a non-empty, ordered key list.
    pub fn new(keys: Vec<String>) -> AppResult<Self> {
        if keys.is_empty() {
            return Err(AppError::Validation(
                "YoutubeApi requires at least one API key".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(config::youtube::http_timeout())
            .build()?;
        Ok(Self {
            http,
            api_base: API_BASE.to_string(),
            keys,
            cursor: Mutex::new(0),
            retry: RetryPolicy::default(),
        })
    }

    /// Overrides the API base URL (tests, proxies).
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Overrides the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Rebuilds the HTTP client with a different request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> AppResult<Self> {
        self.http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    fn current_key(&self) -> String {
        let cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
        self.keys[*cursor].clone()
    }

    /// Advances the cursor (wrapping) and emits the rotation event.
    fn rotate_key(&self) {
        let position = {
            let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
            *cursor = (*cursor + 1) % self.keys.len();
            *cursor
        };
        metrics::API_KEY_ROTATIONS_TOTAL.inc();
        log::warn!(
            "YouTube API: rotating key (now {}/{})",
            position + 1,
            self.keys.len()
        );
    }

    /// Issues one API call, rotating keys on quota rejections and retrying
    /// transport errors per key.
    ///
    /// The `key` query parameter is injected here; `params` carries the
    /// endpoint-specific query only.
    pub async fn call(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<JsonValue, ApiCallError> {
        let url = format!("{}/{}", self.api_base, endpoint);
        let attempts = self.retry.attempts.max(1);
        let mut keys_tried = 0;

        while keys_tried < self.keys.len() {
            let key = self.current_key();

            // Fresh attempt loop per key: rotation does not count against
            // the next key's retry budget, and the backoff restarts.
            for attempt in 1..=attempts {
                match self.attempt(&url, params, &key).await {
                    Step::Success(body) => {
                        metrics::API_CALLS_TOTAL.with_label_values(&["success"]).inc();
                        return Ok(body);
                    }
                    Step::RotateKey => {
                        self.rotate_key();
                        keys_tried += 1;
                        break;
                    }
                    Step::Hard(err) => {
                        metrics::API_CALLS_TOTAL.with_label_values(&["hard_error"]).inc();
                        return Err(err);
                    }
                    Step::RetryTransient(err) => {
                        if attempt == attempts {
                            metrics::API_CALLS_TOTAL.with_label_values(&["unavailable"]).inc();
                            return Err(ApiCallError::RetriesExhausted {
                                attempts: attempt,
                                source: err,
                            });
                        }
                        let delay = self.retry.delay_for_attempt(attempt - 1);
                        log::debug!(
                            "YouTube API: attempt {}/{} for {} failed ({}), retrying in {:?}",
                            attempt,
                            attempts,
                            endpoint,
                            err,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        metrics::API_CALLS_TOTAL.with_label_values(&["unavailable"]).inc();
        Err(ApiCallError::KeysExhausted(self.keys.len()))
    }

    /// One HTTP attempt with one key, classified into a state transition.
    async fn attempt(&self, url: &str, params: &[(&str, &str)], key: &str) -> Step {
        let response = match self
            .http
            .get(url)
            .query(params)
            .query(&[("key", key)])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return Step::RetryTransient(e),
        };

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            // A 403 rotates only when the structured body names a quota
            // reason; otherwise it is a plain hard error.
            return match response.json::<JsonValue>().await {
                Ok(body) if has_quota_reason(&body) => Step::RotateKey,
                _ => Step::Hard(ApiCallError::Status(status)),
            };
        }
        if !status.is_success() {
            return Step::Hard(ApiCallError::Status(status));
        }

        match response.json::<JsonValue>().await {
            Ok(body) => Step::Success(body),
            Err(e) => Step::Hard(ApiCallError::Body(e)),
        }
    }
}

fn has_quota_reason(body: &JsonValue) -> bool {
    body.get("error")
        .and_then(|e| e.get("errors"))
        .and_then(JsonValue::as_array)
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e.get("reason").and_then(JsonValue::as_str))
                .any(|reason| QUOTA_REASONS.contains(&reason))
        })
        .unwrap_or(false)
}
