//! The pipeline every request goes through
//!
//! rate limit -> attach credential -> transport -> one refresh-and-resend on
//! 401 -> transient retry for idempotent methods -> decode -> log.
//!
//! The 401 refresh happens at most once per call, however many transient
//! retries the call goes through.

use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::constants::headers;
use super::http::{RawResponse, RequestDescriptor};
use super::request::Operation;
use super::resilience::{ApiLogger, OperationContext, RateLimiter, RateLimiterStats, RetryPolicy};
use super::resource::ResourceDescriptor;
use super::transport::Transport;
use crate::auth::{Authenticator, Credential};
use crate::error::Result;

/// State shared by every attempt of one call
#[derive(Default)]
struct CallState {
    rate_limit_wait_ms: AtomicU64,
    refreshed: AtomicBool,
}

pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    authenticator: Arc<Authenticator>,
    rate_limiter: RateLimiter,
    retry_policy: RetryPolicy,
    logger: ApiLogger,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        authenticator: Arc<Authenticator>,
        rate_limiter: RateLimiter,
        retry_policy: RetryPolicy,
        logger: ApiLogger,
    ) -> Self {
        Self {
            transport,
            authenticator,
            rate_limiter,
            retry_policy,
            logger,
        }
    }

    pub fn authenticator(&self) -> &Arc<Authenticator> {
        &self.authenticator
    }

    pub fn logger(&self) -> &ApiLogger {
        &self.logger
    }

    pub fn rate_limiter_stats(&self) -> RateLimiterStats {
        self.rate_limiter.stats()
    }

    /// Send `request` and hand the final response to `decode`. The operation
    /// is logged as failed if either the exchange or the decode fails.
    pub async fn execute<T, D>(
        &self,
        resource: &ResourceDescriptor,
        operation: Operation,
        request: &RequestDescriptor,
        decode: D,
    ) -> Result<T>
    where
        D: FnOnce(RawResponse) -> Result<T>,
    {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        let context = self
            .logger
            .start_operation(operation.operation_type(), resource.name, &correlation_id);

        let state = CallState::default();
        let mut retry_attempts = 0;

        let sent = if request.method.is_idempotent() {
            self.retry_policy
                .execute(
                    || self.send_authorized(request, &context, &state),
                    |attempt, error, delay| {
                        retry_attempts += 1;
                        self.logger.log_retry(&context, attempt, error, delay);
                    },
                )
                .await
        } else {
            self.send_authorized(request, &context, &state).await
        };

        let status_code = sent.as_ref().ok().map(|response| response.status);
        let result = sent.and_then(decode);

        let mut metrics = context.create_metrics(
            result.is_ok(),
            status_code,
            result.as_ref().err().map(|e| e.to_string()),
        );
        metrics.retry_attempts = retry_attempts;
        metrics.rate_limit_delay = Duration::from_millis(state.rate_limit_wait_ms.load(Ordering::Relaxed));
        self.logger.complete_operation(&context, &metrics);

        result
    }

    /// One exchange with the current credential. The first 401 of a call
    /// refreshes the credential and resends; any later 401 in the same call,
    /// including one met on a transient retry, is returned as final.
    async fn send_authorized(
        &self,
        request: &RequestDescriptor,
        context: &OperationContext,
        state: &CallState,
    ) -> Result<RawResponse> {
        let credential = self.authenticator.credential().await?;
        let response = self.send_once(request, &credential, context, state).await?;

        if response.status != 401 || state.refreshed.swap(true, Ordering::AcqRel) {
            return Ok(response);
        }

        self.logger.log_unauthorized(context);
        let fresh = self.authenticator.refresh_after_rejection(&credential).await?;
        self.send_once(request, &fresh, context, state).await
    }

    async fn send_once(
        &self,
        request: &RequestDescriptor,
        credential: &Credential,
        context: &OperationContext,
        state: &CallState,
    ) -> Result<RawResponse> {
        let delay = self.rate_limiter.acquire().await;
        if !delay.is_zero() {
            state
                .rate_limit_wait_ms
                .fetch_add(delay.as_millis() as u64, Ordering::Relaxed);
            self.logger.log_rate_limit(context, delay);
        }

        let authorization = credential.authorize(request)?;
        let authorized = request.with_header(headers::AUTHORIZATION, authorization);

        self.logger
            .log_request(context, request.method.as_str(), &request.url, &authorized.headers);

        let start = Instant::now();
        let response = self.transport.send(&authorized).await?;
        self.logger.log_response(context, response.status, start.elapsed());
        debug!("{} {} -> {}", request.method, request.url, response.status);

        Ok(response)
    }
}
