//! Retry policies with exponential backoff
//!
//! Transient failures (network errors, 408, 429, 5xx) are retried with
//! jittered exponential backoff. The caller decides whether a request may be
//! retried at all; only idempotent methods go through [`RetryPolicy::execute`].

use log::{debug, info, warn};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::api::constants::headers;
use crate::api::http::RawResponse;
use crate::error::{ApiError, Result};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Send once and never wait
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }
}

/// Failure classes and their retry behavior
#[derive(Debug, Clone, PartialEq)]
pub enum RetryableError {
    /// Connection refused, reset, DNS and the like
    Network,
    ServerError(u16),
    /// 429 Too Many Requests
    RateLimited,
    /// 408 or a client-side timeout
    Timeout,
    /// 4xx other than 408 and 429
    ClientError(u16),
    AuthError,
    Unknown,
}

impl RetryableError {
    pub fn should_retry(&self) -> bool {
        match self {
            RetryableError::Network => true,
            RetryableError::ServerError(_) => true,
            RetryableError::RateLimited => true,
            RetryableError::Timeout => true,
            RetryableError::ClientError(_) => false,
            RetryableError::AuthError => false,
            RetryableError::Unknown => false,
        }
    }

    pub fn from_status_code(status: u16) -> Self {
        match status {
            401 | 403 => RetryableError::AuthError,
            408 => RetryableError::Timeout,
            429 => RetryableError::RateLimited,
            400..=499 => RetryableError::ClientError(status),
            500..=599 => RetryableError::ServerError(status),
            _ => RetryableError::Unknown,
        }
    }

    pub fn from_api_error(error: &ApiError) -> Self {
        match error {
            ApiError::Transport(_) => RetryableError::Network,
            ApiError::Timeout(_) => RetryableError::Timeout,
            ApiError::Auth(_) => RetryableError::AuthError,
            ApiError::Http { status, .. } => Self::from_status_code(*status),
            _ => RetryableError::Unknown,
        }
    }

    /// `None` for responses that are final (success or non-transient failure)
    pub fn from_response(response: &RawResponse) -> Option<Self> {
        if response.is_success() {
            return None;
        }
        let class = Self::from_status_code(response.status);
        class.should_retry().then_some(class)
    }
}

/// Exponential backoff with jitter
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// Run `operation` until it yields a final response or error.
    ///
    /// A transient status on the last attempt is returned as the response so
    /// the decoder can report it. `on_retry` is told about every retry with
    /// the attempt number that failed and the delay before the next one.
    pub async fn execute<F, Fut, R>(&self, operation: F, mut on_retry: R) -> Result<RawResponse>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<RawResponse>>,
        R: FnMut(u32, &str, Duration),
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;

        loop {
            debug!("Executing operation (attempt {}/{})", attempt, max_attempts);

            let (reason, delay) = match operation().await {
                Ok(response) => match RetryableError::from_response(&response) {
                    Some(class) if attempt < max_attempts => {
                        let delay = self
                            .retry_after(&response)
                            .unwrap_or_else(|| self.calculate_delay(attempt));
                        (format!("{:?} (HTTP {})", class, response.status), delay)
                    }
                    _ => {
                        if attempt > 1 {
                            info!("Operation finished after {} attempts", attempt);
                        }
                        return Ok(response);
                    }
                },
                Err(error) => {
                    let should_retry = RetryableError::from_api_error(&error).should_retry();
                    if !should_retry || attempt >= max_attempts {
                        warn!(
                            "Operation failed permanently on attempt {} (should_retry: {}): {}",
                            attempt, should_retry, error
                        );
                        return Err(error);
                    }
                    (error.to_string(), self.calculate_delay(attempt))
                }
            };

            warn!("Operation failed on attempt {} (retryable): {}", attempt, reason);
            on_retry(attempt, &reason, delay);
            debug!("Waiting {:?} before retry", delay);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Server-requested delay, capped at `max_delay`. Accepts both the
    /// delta-seconds and the HTTP-date forms.
    fn retry_after(&self, response: &RawResponse) -> Option<Duration> {
        let value = response.header(headers::RETRY_AFTER)?.trim();
        let delay = match value.parse::<u64>() {
            Ok(seconds) => Duration::from_secs(seconds),
            Err(_) => {
                let at = chrono::DateTime::parse_from_rfc2822(value).ok()?;
                (at.with_timezone(&chrono::Utc) - chrono::Utc::now())
                    .to_std()
                    .unwrap_or(Duration::ZERO)
            }
        };
        Some(delay.min(self.config.max_delay))
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms = (self.config.base_delay.as_millis() as f64)
            * self.config.backoff_multiplier.powi(attempt as i32 - 1);

        let mut delay = Duration::from_millis(delay_ms as u64);

        if delay > self.config.max_delay {
            delay = self.config.max_delay;
        }

        if self.config.jitter {
            let jitter_factor = rand::thread_rng().gen_range(0.5..=1.5);
            let jittered_ms = (delay.as_millis() as f64 * jitter_factor) as u64;
            delay = Duration::from_millis(jittered_ms);
        }

        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn test_retryable_error_classification() {
        assert!(RetryableError::Network.should_retry());
        assert!(RetryableError::ServerError(500).should_retry());
        assert!(RetryableError::RateLimited.should_retry());
        assert!(RetryableError::Timeout.should_retry());

        assert!(!RetryableError::ClientError(400).should_retry());
        assert!(!RetryableError::AuthError.should_retry());
        assert!(!RetryableError::Unknown.should_retry());
    }

    #[test]
    fn test_status_code_classification() {
        assert_eq!(RetryableError::from_status_code(401), RetryableError::AuthError);
        assert_eq!(RetryableError::from_status_code(408), RetryableError::Timeout);
        assert_eq!(RetryableError::from_status_code(429), RetryableError::RateLimited);
        assert_eq!(RetryableError::from_status_code(404), RetryableError::ClientError(404));
        assert_eq!(RetryableError::from_status_code(503), RetryableError::ServerError(503));
    }

    #[test]
    fn test_api_error_classification() {
        assert_eq!(
            RetryableError::from_api_error(&ApiError::Transport("reset".into())),
            RetryableError::Network
        );
        assert_eq!(
            RetryableError::from_api_error(&ApiError::Timeout("30s".into())),
            RetryableError::Timeout
        );
        assert_eq!(
            RetryableError::from_api_error(&ApiError::Decode("eof".into())),
            RetryableError::Unknown
        );
    }

    #[test]
    fn test_delay_calculation() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: false,
        });

        assert_eq!(policy.calculate_delay(1), Duration::from_millis(100));
        assert_eq!(policy.calculate_delay(2), Duration::from_millis(200));
        assert_eq!(policy.calculate_delay(3), Duration::from_millis(400));
    }

    #[test]
    fn test_max_delay_cap() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: false,
        });

        assert_eq!(policy.calculate_delay(5), Duration::from_secs(5));
        assert_eq!(policy.calculate_delay(10), Duration::from_secs(5));
    }

    #[test]
    fn test_retry_after_is_capped() {
        let policy = RetryPolicy::new(fast_config(3));
        let response = RawResponse::new(429, vec![("Retry-After".to_string(), "120".to_string())], "");

        assert_eq!(policy.retry_after(&response), Some(Duration::from_millis(10)));
        assert_eq!(policy.retry_after(&RawResponse::new(429, Vec::new(), "")), None);
    }

    #[tokio::test]
    async fn test_transient_status_retried_until_success() {
        let policy = RetryPolicy::new(fast_config(3));
        let calls = Arc::new(AtomicU32::new(0));
        let mut retries = Vec::new();

        let response = policy
            .execute(
                || {
                    let calls = calls.clone();
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        let status = if n == 0 { 503 } else { 200 };
                        Ok(RawResponse::new(status, Vec::new(), "{}"))
                    }
                },
                |attempt, _, _| retries.push(attempt),
            )
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(retries, vec![1]);
    }

    #[tokio::test]
    async fn test_last_transient_response_is_returned() {
        let policy = RetryPolicy::new(fast_config(2));
        let calls = Arc::new(AtomicU32::new(0));

        let response = policy
            .execute(
                || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(RawResponse::new(500, Vec::new(), "boom"))
                    }
                },
                |_, _, _| {},
            )
            .await
            .unwrap();

        assert_eq!(response.status, 500);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let policy = RetryPolicy::new(fast_config(3));
        let calls = Arc::new(AtomicU32::new(0));

        let response = policy
            .execute(
                || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(RawResponse::new(400, Vec::new(), "bad"))
                    }
                },
                |_, _, _| {},
            )
            .await
            .unwrap();

        assert_eq!(response.status, 400);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_network_error_retried_then_surfaced() {
        let policy = RetryPolicy::new(fast_config(3));
        let calls = Arc::new(AtomicU32::new(0));

        let err = policy
            .execute(
                || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err::<RawResponse, _>(ApiError::Transport("connection reset".into()))
                    }
                },
                |_, _, _| {},
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Transport(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
