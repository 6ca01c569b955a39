//! Resilience settings
//!
//! Retry, rate limiting and logging for one client. A configuration file
//! names a [`ResilienceProfile`]; code can start from a profile and adjust
//! individual knobs with [`ResilienceConfigBuilder`].

use super::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub rate_limit: RateLimitConfig,
    pub monitoring: MonitoringConfig,
}

/// Token bucket sizing, shared by every accessor of a client
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub burst_capacity: u32,
    pub enabled: bool,
}

/// What [`ApiLogger`](super::ApiLogger) emits
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    pub request_logging: bool,
    pub performance_metrics: bool,
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Named preset as written in configuration files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResilienceProfile {
    /// Three attempts, 60 calls a minute
    #[default]
    Default,
    /// Two slower attempts and a bucket below the tenant limit, for
    /// organisations shared with other integrations
    Conservative,
    /// Five attempts, no client-side throttling, debug logs
    Development,
    /// One attempt, no throttling, errors only
    Disabled,
}

impl ResilienceProfile {
    pub fn to_config(self) -> ResilienceConfig {
        let base = ResilienceConfig::default();

        match self {
            ResilienceProfile::Default => base,
            ResilienceProfile::Conservative => ResilienceConfig {
                retry: RetryConfig {
                    max_attempts: 2,
                    base_delay: Duration::from_secs(1),
                    max_delay: Duration::from_secs(10),
                    backoff_multiplier: 1.5,
                    ..base.retry
                },
                rate_limit: RateLimitConfig {
                    requests_per_minute: 50,
                    burst_capacity: 5,
                    ..base.rate_limit
                },
                monitoring: MonitoringConfig {
                    log_level: LogLevel::Warn,
                    ..base.monitoring
                },
            },
            ResilienceProfile::Development => ResilienceConfig {
                retry: RetryConfig {
                    max_attempts: 5,
                    base_delay: Duration::from_millis(200),
                    max_delay: Duration::from_secs(60),
                    ..base.retry
                },
                rate_limit: RateLimitConfig {
                    enabled: false,
                    ..base.rate_limit
                },
                monitoring: MonitoringConfig {
                    log_level: LogLevel::Debug,
                    ..base.monitoring
                },
            },
            ResilienceProfile::Disabled => ResilienceConfig {
                retry: RetryConfig::single_attempt(),
                rate_limit: RateLimitConfig {
                    enabled: false,
                    ..base.rate_limit
                },
                monitoring: MonitoringConfig {
                    request_logging: false,
                    performance_metrics: false,
                    log_level: LogLevel::Error,
                },
            },
        }
    }

    pub fn builder(self) -> ResilienceConfigBuilder {
        ResilienceConfigBuilder {
            config: self.to_config(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // The accounting API allows 60 calls per minute per tenant
        Self {
            requests_per_minute: 60,
            burst_capacity: 10,
            enabled: true,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            request_logging: true,
            performance_metrics: true,
            log_level: LogLevel::Info,
        }
    }
}

impl ResilienceConfig {
    /// Builder seeded with the default profile
    pub fn builder() -> ResilienceConfigBuilder {
        ResilienceProfile::Default.builder()
    }
}

#[derive(Debug, Clone)]
pub struct ResilienceConfigBuilder {
    config: ResilienceConfig,
}

impl ResilienceConfigBuilder {
    /// Total tries for an idempotent request, the first one included
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts.max(1);
        self
    }

    /// First back-off delay and the cap that also bounds `Retry-After`
    pub fn backoff(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.config.retry.base_delay = base_delay;
        self.config.retry.max_delay = max_delay.max(base_delay);
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.config.retry.jitter = false;
        self
    }

    pub fn no_retries(mut self) -> Self {
        self.config.retry = RetryConfig::single_attempt();
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Enable client-side throttling at `per_minute` with room for `burst`
    /// back-to-back calls
    pub fn throttle(mut self, per_minute: u32, burst: u32) -> Self {
        self.config.rate_limit = RateLimitConfig {
            requests_per_minute: per_minute,
            burst_capacity: burst.max(1),
            enabled: true,
        };
        self
    }

    pub fn unthrottled(mut self) -> Self {
        self.config.rate_limit.enabled = false;
        self
    }

    pub fn rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.config.rate_limit = rate_limit;
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.monitoring.log_level = level;
        self
    }

    /// Drop per-request and timing records, keep failures
    pub fn quiet(mut self) -> Self {
        self.config.monitoring.request_logging = false;
        self.config.monitoring.performance_metrics = false;
        self
    }

    pub fn build(self) -> ResilienceConfig {
        self.config
    }
}
