//! Structured logging with correlation tracking
//!
//! Every dispatched operation gets a correlation id. Log records are JSON
//! objects rendered through the `log` facade so any logger can pick them up.

use super::config::{LogLevel, MonitoringConfig};
use log::{debug, error, info, warn};
use serde_json::{Map, Value, json};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ApiLogger {
    config: MonitoringConfig,
}

/// Context for a single API operation
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub correlation_id: String,
    /// `list`, `create`, `get_binary`, ...
    pub operation_type: String,
    /// Resource name as it appears in the URL, e.g. `Invoices`
    pub resource: String,
    pub start_time: Instant,
}

#[derive(Debug, Clone)]
pub struct OperationMetrics {
    pub duration: Duration,
    pub retry_attempts: u32,
    pub success: bool,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
    /// Total time spent waiting on the rate limiter
    pub rate_limit_delay: Duration,
}

impl ApiLogger {
    pub fn new(config: MonitoringConfig) -> Self {
        Self { config }
    }

    pub fn start_operation(&self, operation_type: &str, resource: &str, correlation_id: &str) -> OperationContext {
        let context = OperationContext {
            correlation_id: correlation_id.to_string(),
            operation_type: operation_type.to_string(),
            resource: resource.to_string(),
            start_time: Instant::now(),
        };

        if self.config.request_logging && self.should_log(LogLevel::Debug) {
            let log_data = json!({
                "event": "operation_started",
                "correlation_id": context.correlation_id,
                "operation_type": context.operation_type,
                "resource": context.resource,
                "timestamp": chrono::Utc::now().to_rfc3339()
            });

            debug!("API Operation Started: {}", log_data);
        }

        context
    }

    pub fn log_request(&self, context: &OperationContext, method: &str, url: &str, headers: &[(String, String)]) {
        if !self.config.request_logging || !self.should_log(LogLevel::Debug) {
            return;
        }

        let log_data = json!({
            "event": "http_request",
            "correlation_id": context.correlation_id,
            "operation_type": context.operation_type,
            "resource": context.resource,
            "method": method,
            "url": url,
            "headers": sanitize_headers(headers),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        debug!("HTTP Request: {}", log_data);
    }

    pub fn log_response(&self, context: &OperationContext, status_code: u16, duration: Duration) {
        if !self.config.request_logging || !self.should_log(LogLevel::Debug) {
            return;
        }

        let log_data = json!({
            "event": "http_response",
            "correlation_id": context.correlation_id,
            "operation_type": context.operation_type,
            "resource": context.resource,
            "status_code": status_code,
            "duration_ms": duration.as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        if status_code >= 400 {
            warn!("HTTP Response (Error): {}", log_data);
        } else {
            debug!("HTTP Response: {}", log_data);
        }
    }

    pub fn log_retry(&self, context: &OperationContext, attempt: u32, error: &str, delay: Duration) {
        if !self.should_log(LogLevel::Warn) {
            return;
        }

        let log_data = json!({
            "event": "retry_attempt",
            "correlation_id": context.correlation_id,
            "operation_type": context.operation_type,
            "resource": context.resource,
            "attempt": attempt,
            "error": error,
            "delay_ms": delay.as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        warn!("Retry Attempt: {}", log_data);
    }

    pub fn log_rate_limit(&self, context: &OperationContext, delay: Duration) {
        if !self.should_log(LogLevel::Debug) {
            return;
        }

        let log_data = json!({
            "event": "rate_limited",
            "correlation_id": context.correlation_id,
            "resource": context.resource,
            "delay_ms": delay.as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        debug!("Rate Limited: {}", log_data);
    }

    /// The server rejected the credential; one refresh-and-resend follows
    pub fn log_unauthorized(&self, context: &OperationContext) {
        if !self.should_log(LogLevel::Warn) {
            return;
        }

        let log_data = json!({
            "event": "credential_rejected",
            "correlation_id": context.correlation_id,
            "resource": context.resource,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        warn!("Credential Rejected: {}", log_data);
    }

    pub fn complete_operation(&self, context: &OperationContext, metrics: &OperationMetrics) {
        if !self.config.performance_metrics {
            return;
        }

        let level = if metrics.success { LogLevel::Info } else { LogLevel::Error };
        if !self.should_log(level) {
            return;
        }

        let log_data = json!({
            "event": "operation_completed",
            "correlation_id": context.correlation_id,
            "operation_type": context.operation_type,
            "resource": context.resource,
            "duration_ms": metrics.duration.as_millis(),
            "retry_attempts": metrics.retry_attempts,
            "success": metrics.success,
            "status_code": metrics.status_code,
            "error_message": metrics.error_message,
            "rate_limit_delay_ms": metrics.rate_limit_delay.as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        if metrics.success {
            info!("API Operation Completed: {}", log_data);
        } else {
            error!("API Operation Failed: {}", log_data);
        }
    }

    /// Per-record results of a batch write
    pub fn log_batch_outcome(&self, resource: &str, operation_type: &str, submitted: usize, rejected: usize) {
        if !self.config.performance_metrics || !self.should_log(LogLevel::Info) {
            return;
        }

        let log_data = json!({
            "event": "batch_outcome",
            "resource": resource,
            "operation_type": operation_type,
            "submitted": submitted,
            "accepted": submitted.saturating_sub(rejected),
            "rejected": rejected,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        if rejected > 0 {
            warn!("Batch Completed With Rejections: {}", log_data);
        } else {
            info!("Batch Completed: {}", log_data);
        }
    }

    fn should_log(&self, level: LogLevel) -> bool {
        level <= self.config.log_level
    }
}

fn sanitize_headers(headers: &[(String, String)]) -> Value {
    let mut sanitized = Map::new();

    for (key, value) in headers {
        let key_lower = key.to_lowercase();
        let value = if key_lower.contains("authorization") || key_lower.contains("token") || key_lower.contains("key") {
            "[REDACTED]".to_string()
        } else {
            value.clone()
        };
        sanitized.insert(key.clone(), Value::String(value));
    }

    Value::Object(sanitized)
}

impl OperationContext {
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn create_metrics(&self, success: bool, status_code: Option<u16>, error_message: Option<String>) -> OperationMetrics {
        OperationMetrics {
            duration: self.elapsed(),
            retry_attempts: 0,
            success,
            status_code,
            error_message,
            rate_limit_delay: Duration::ZERO,
        }
    }
}

impl OperationMetrics {
    pub fn is_slow(&self, threshold: Duration) -> bool {
        self.duration > threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debug_config() -> MonitoringConfig {
        MonitoringConfig {
            request_logging: true,
            performance_metrics: true,
            log_level: LogLevel::Debug,
        }
    }

    #[test]
    fn test_operation_context_creation() {
        let logger = ApiLogger::new(debug_config());
        let context = logger.start_operation("create", "Invoices", "test-123");

        assert_eq!(context.correlation_id, "test-123");
        assert_eq!(context.operation_type, "create");
        assert_eq!(context.resource, "Invoices");
    }

    #[test]
    fn test_operation_metrics() {
        let logger = ApiLogger::new(debug_config());
        let context = logger.start_operation("list", "Contacts", "test-456");

        let metrics = context.create_metrics(true, Some(200), None);
        assert_eq!(metrics.retry_attempts, 0);
        assert!(metrics.success);
        assert_eq!(metrics.status_code, Some(200));
        assert_eq!(metrics.rate_limit_delay, Duration::ZERO);
        assert!(!metrics.is_slow(Duration::from_secs(10)));
    }

    #[test]
    fn test_header_sanitization() {
        let headers = vec![
            ("Authorization".to_string(), "Bearer secret-token".to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
            ("xero-tenant-id".to_string(), "tenant".to_string()),
        ];

        let sanitized = sanitize_headers(&headers);

        assert_eq!(sanitized["Authorization"], "[REDACTED]");
        assert_eq!(sanitized["Content-Type"], "application/json");
        assert_eq!(sanitized["xero-tenant-id"], "tenant");
    }

    #[test]
    fn test_log_level_filtering() {
        let logger = ApiLogger::new(MonitoringConfig {
            request_logging: true,
            performance_metrics: true,
            log_level: LogLevel::Warn,
        });

        assert!(logger.should_log(LogLevel::Error));
        assert!(logger.should_log(LogLevel::Warn));
        assert!(!logger.should_log(LogLevel::Info));
        assert!(!logger.should_log(LogLevel::Trace));
    }
}
