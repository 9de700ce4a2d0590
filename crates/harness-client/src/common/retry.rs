//! Retry policy for Harness API requests
//!
//! Bounded retries with capped exponential backoff: attempt `n` (0-based)
//! waits `min(wait_min * 2^n, wait_max)`. A `Retry-After` header on 429/503
//! replaces the computed delay, still capped at `wait_max`.

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

/// Retry settings for the HTTP client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub wait_min: Duration,
    /// Upper bound for any delay
    pub wait_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            wait_min: Duration::from_secs(5),
            wait_max: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// No retries at all
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.wait_min
            .checked_mul(factor)
            .map_or(self.wait_max, |d| d.min(self.wait_max))
    }

    /// Delay before retry number `attempt`, honouring `Retry-After` on 429/503
    pub fn delay_for_response(&self, attempt: u32, status: StatusCode, headers: &HeaderMap) -> Duration {
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
            if let Some(secs) = retry_after_seconds(headers) {
                return Duration::from_secs(secs).min(self.wait_max);
            }
        }
        self.delay(attempt)
    }

    /// Whether a response with this status should be retried
    pub fn should_retry_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS
            || (status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED)
    }

    /// Whether a transport error should be retried
    pub fn should_retry_error(error: &reqwest::Error) -> bool {
        error.is_connect() || error.is_timeout() || error.is_request()
    }
}

fn retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
