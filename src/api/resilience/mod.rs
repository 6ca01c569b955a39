//! Retry policies, rate limiting and structured operation logging

pub mod config;
pub mod logging;
pub mod rate_limiter;
pub mod retry;

pub use config::{LogLevel, MonitoringConfig, RateLimitConfig, ResilienceConfig, ResilienceConfigBuilder, ResilienceProfile};
pub use logging::{ApiLogger, OperationContext, OperationMetrics};
pub use rate_limiter::{RateLimiter, RateLimiterStats};
pub use retry::{RetryConfig, RetryPolicy, RetryableError};
