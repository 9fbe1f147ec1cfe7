// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared outbound HTTP plumbing: rate-limit retry and response checks.

use crate::error::{AppError, Provider};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Per-request timeout for every provider call.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest response body excerpt kept in error messages.
const MAX_ERROR_BODY: usize = 512;

/// Retry policy for HTTP 429 responses. Other statuses are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay after the first 429; doubles after each further one.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1` (attempts count from 1).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1 << exponent)
    }
}

/// Build the HTTP client used by the provider clients.
pub fn build_http_client() -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed building HTTP client: {e}")))
}

/// Send the request produced by `build`, retrying with exponential backoff
/// while the provider answers 429.
pub async fn send_with_retry<F>(
    policy: &RetryPolicy,
    provider: Provider,
    build: F,
) -> Result<reqwest::Response, AppError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 1;
    loop {
        let response = build()
            .send()
            .await
            .map_err(|e| AppError::upstream(provider, format!("request failed: {e}")))?;

        if response.status() != StatusCode::TOO_MANY_REQUESTS {
            return Ok(response);
        }

        if attempt >= policy.max_attempts {
            tracing::warn!(%provider, attempt, "Rate limited, giving up");
            return Err(AppError::RateLimited(provider));
        }

        let delay = policy.backoff(attempt);
        tracing::warn!(
            %provider,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Rate limited (429), backing off"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Check response status and return error if not successful.
pub async fn check_response(
    provider: Provider,
    response: reqwest::Response,
) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }

    Err(AppError::Upstream {
        provider,
        status: Some(status.as_u16()),
        message: body,
    })
}

/// Check response and parse JSON body.
pub async fn read_json<T: DeserializeOwned>(
    provider: Provider,
    response: reqwest::Response,
) -> Result<T, AppError> {
    check_response(provider, response)
        .await?
        .json()
        .await
        .map_err(|e| AppError::upstream(provider, format!("JSON parse error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_initial() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
    }
}
