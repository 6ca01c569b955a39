//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime};
use wiremock::MockServer;

use xero_accounting::api::ResilienceConfig;
use xero_accounting::auth::{Credential, CredentialProvider};
use xero_accounting::{AccountingApiClient, AuthConfig, AuthError, ClientConfig};

pub const INVOICES_PATH: &str = "/api.xro/2.0/Invoices";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Retries in milliseconds, no rate limiting
pub fn fast_resilience() -> ResilienceConfig {
    ResilienceConfig::builder()
        .attempts(3)
        .backoff(Duration::from_millis(5), Duration::from_millis(20))
        .without_jitter()
        .unthrottled()
        .build()
}

pub fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::new(AuthConfig::Bearer {
        access_token: "test-token".to_string(),
    })
    .with_endpoint_base(server.uri())
    .with_tenant_id("tenant-1")
}

/// Client talking to `server` with a static bearer token
pub fn client_for(server: &MockServer) -> AccountingApiClient {
    init_logging();
    AccountingApiClient::builder(config_for(server))
        .resilience(fast_resilience())
        .build()
        .expect("client builds")
}

/// Client whose credentials come from `provider`
pub fn client_with_provider(server: &MockServer, provider: Arc<dyn CredentialProvider>) -> AccountingApiClient {
    init_logging();
    AccountingApiClient::builder(config_for(server))
        .credential_provider(provider)
        .resilience(fast_resilience())
        .build()
        .expect("client builds")
}

/// Issues `token-1`, `token-2`, ... after an optional delay, counting exchanges
pub struct CountingProvider {
    pub calls: AtomicU32,
    pub delay: Duration,
    pub fail: bool,
}

impl CountingProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            delay: Duration::ZERO,
            fail: false,
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            delay,
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            delay: Duration::ZERO,
            fail: true,
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for CountingProvider {
    async fn acquire(&self, _previous: Option<&Credential>) -> Result<Credential, AuthError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(AuthError::Exchange {
                status: 401,
                body: "{\"error\":\"invalid_client\"}".to_string(),
            });
        }
        Ok(Credential::bearer(
            format!("token-{}", n),
            Some(SystemTime::now() + Duration::from_secs(1800)),
        ))
    }
}

pub fn envelope(plural_key: &str, records: Vec<Value>) -> Value {
    json!({
        "Id": "5b0e8ab7-0f1a-4c5b-9d43-2f0d3c1a8e11",
        "Status": "OK",
        "ProviderName": "xero-accounting tests",
        "DateTimeUTC": "/Date(1539774183170)/",
        plural_key: records
    })
}

pub fn invoice(id: &str) -> Value {
    json!({
        "Type": "ACCREC",
        "InvoiceID": id,
        "InvoiceNumber": format!("INV-{}", &id[..4.min(id.len())]),
        "Status": "DRAFT",
        "Contact": { "Name": "Bank West" },
        "Total": 250.0
    })
}

pub fn invoice_request(reference: &str) -> Value {
    json!({
        "Type": "ACCREC",
        "Contact": { "Name": "Bank West" },
        "Reference": reference,
        "LineItems": [{
            "Description": "Consulting services",
            "Quantity": 10,
            "UnitAmount": 25.0,
            "AccountCode": "200"
        }]
    })
}
