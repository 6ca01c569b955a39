//! Credential lifecycle with coalesced refresh
//!
//! The current credential sits behind an `RwLock` for the fast path. Refreshes
//! serialize on a separate mutex; a caller that waited on that mutex re-checks
//! state after acquiring it, so concurrent callers share one exchange. The
//! credential is only replaced once an exchange completes, which keeps a
//! cancelled caller from leaving state half-written.

use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use super::credentials::Credential;
use super::providers::CredentialProvider;
use crate::api::http::RequestDescriptor;
use crate::error::AuthError;

/// Default margin before expiry at which a credential is refreshed
pub const DEFAULT_EXPIRY_SKEW: Duration = Duration::from_secs(60);

pub struct Authenticator {
    provider: Arc<dyn CredentialProvider>,
    current: RwLock<Option<Arc<Credential>>>,
    refresh_lock: Mutex<RefreshLedger>,
    attempts: AtomicU64,
    refreshes: AtomicU64,
    skew: Duration,
}

#[derive(Default)]
struct RefreshLedger {
    last_failure: Option<AuthError>,
}

impl Authenticator {
    pub fn new(provider: Arc<dyn CredentialProvider>) -> Self {
        Self::with_skew(provider, DEFAULT_EXPIRY_SKEW)
    }

    pub fn with_skew(provider: Arc<dyn CredentialProvider>, skew: Duration) -> Self {
        Self {
            provider,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(RefreshLedger::default()),
            attempts: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
            skew,
        }
    }

    /// `Authorization` header value for the request, refreshing first if the
    /// credential is absent or expired
    pub async fn authorization(&self, request: &RequestDescriptor) -> Result<String, AuthError> {
        self.credential().await?.authorize(request)
    }

    /// A currently valid credential
    pub async fn credential(&self) -> Result<Arc<Credential>, AuthError> {
        if let Some(credential) = self.valid_current().await {
            return Ok(credential);
        }

        let seen = self.attempts.load(Ordering::SeqCst);
        let mut ledger = self.refresh_lock.lock().await;

        // Someone else may have refreshed while we waited
        if let Some(credential) = self.valid_current().await {
            debug!("Reusing credential refreshed by a concurrent caller");
            return Ok(credential);
        }
        if self.attempts.load(Ordering::SeqCst) != seen {
            if let Some(failure) = &ledger.last_failure {
                return Err(failure.clone());
            }
        }

        self.refresh_locked(&mut ledger).await
    }

    /// Called after the server rejected `stale` with a 401. Exchanges a new
    /// credential unless another caller already replaced `stale`.
    pub async fn refresh_after_rejection(
        &self,
        stale: &Arc<Credential>,
    ) -> Result<Arc<Credential>, AuthError> {
        let mut ledger = self.refresh_lock.lock().await;

        if let Some(current) = self.current.read().await.clone() {
            if !Arc::ptr_eq(&current, stale) && !current.is_expired(self.skew) {
                debug!("Credential already replaced since the rejected request");
                return Ok(current);
            }
        }

        warn!("Credential rejected by the server, refreshing");
        self.refresh_locked(&mut ledger).await
    }

    /// Drop the current credential; the next call performs a fresh exchange
    pub async fn revoke(&self) {
        let _ledger = self.refresh_lock.lock().await;
        *self.current.write().await = None;
        info!("Credential revoked");
    }

    /// Number of completed successful exchanges
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    async fn valid_current(&self) -> Option<Arc<Credential>> {
        self.current
            .read()
            .await
            .as_ref()
            .filter(|credential| !credential.is_expired(self.skew))
            .cloned()
    }

    async fn refresh_locked(&self, ledger: &mut RefreshLedger) -> Result<Arc<Credential>, AuthError> {
        let previous = self.current.read().await.clone();

        let result = self.provider.acquire(previous.as_deref()).await;
        self.attempts.fetch_add(1, Ordering::SeqCst);

        match result {
            Ok(credential) => {
                let credential = Arc::new(credential);
                *self.current.write().await = Some(Arc::clone(&credential));
                ledger.last_failure = None;
                let count = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
                info!("Credential refreshed (exchange #{})", count);
                Ok(credential)
            }
            Err(error) => {
                warn!("Credential refresh failed: {}", error);
                ledger.last_failure = Some(error.clone());
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;
    use std::time::SystemTime;

    /// Issues `token-1`, `token-2`, ... and counts exchanges
    struct CountingProvider {
        calls: AtomicU32,
        delay: Duration,
        lifetime: Option<Duration>,
        fail: bool,
    }

    impl CountingProvider {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
                delay: Duration::ZERO,
                lifetime: Some(Duration::from_secs(3600)),
                fail: false,
            }
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
                    status: 400,
                    body: "invalid_client".to_string(),
                });
            }
            Ok(Credential::bearer(
                format!("token-{}", n),
                self.lifetime.map(|l| SystemTime::now() + l),
            ))
        }
    }

    #[tokio::test]
    async fn test_lazy_acquire_then_cached() {
        let provider = Arc::new(CountingProvider::new());
        let auth = Authenticator::new(provider.clone());

        let first = auth.credential().await.unwrap();
        let second = auth.credential().await.unwrap();

        assert_eq!(first.access_token(), Some("token-1"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(auth.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_expired_credential_is_refreshed() {
        let provider = Arc::new(CountingProvider {
            lifetime: Some(Duration::from_secs(10)),
            ..CountingProvider::new()
        });
        // Skew larger than the lifetime: every credential is born expired
        let auth = Authenticator::with_skew(provider.clone(), Duration::from_secs(60));

        auth.credential().await.unwrap();
        let second = auth.credential().await.unwrap();

        assert_eq!(second.access_token(), Some("token-2"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_coalesce() {
        let provider = Arc::new(CountingProvider {
            delay: Duration::from_millis(50),
            ..CountingProvider::new()
        });
        let auth = Arc::new(Authenticator::new(provider.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let auth = Arc::clone(&auth);
                tokio::spawn(async move { auth.credential().await })
            })
            .collect();

        for handle in handles {
            let credential = handle.await.unwrap().unwrap();
            assert_eq!(credential.access_token(), Some("token-1"));
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_waiters_share_failure() {
        let provider = Arc::new(CountingProvider {
            delay: Duration::from_millis(50),
            fail: true,
            ..CountingProvider::new()
        });
        let auth = Arc::new(Authenticator::new(provider.clone()));

        let (a, b) = tokio::join!(auth.credential(), auth.credential());

        assert!(matches!(a, Err(AuthError::Exchange { .. })));
        assert!(matches!(b, Err(AuthError::Exchange { .. })));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_after_rejection() {
        let provider = Arc::new(CountingProvider::new());
        let auth = Authenticator::new(provider.clone());

        let stale = auth.credential().await.unwrap();
        let fresh = auth.refresh_after_rejection(&stale).await.unwrap();
        assert_eq!(fresh.access_token(), Some("token-2"));

        // A second caller holding the same stale credential reuses the new one
        let again = auth.refresh_after_rejection(&stale).await.unwrap();
        assert!(Arc::ptr_eq(&fresh, &again));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_refresh_leaves_state_untouched() {
        let provider = Arc::new(CountingProvider {
            delay: Duration::from_millis(200),
            ..CountingProvider::new()
        });
        let auth = Authenticator::new(provider.clone());

        let timed_out = tokio::time::timeout(Duration::from_millis(20), auth.credential()).await;
        assert!(timed_out.is_err());
        assert!(auth.current.read().await.is_none());
        assert_eq!(auth.refresh_count(), 0);

        // The lock was released with the cancelled future
        let credential = auth.credential().await.unwrap();
        assert_eq!(credential.access_token(), Some("token-2"));
    }

    #[tokio::test]
    async fn test_revoke_forces_new_exchange() {
        let provider = Arc::new(CountingProvider::new());
        let auth = Authenticator::new(provider.clone());

        auth.credential().await.unwrap();
        auth.revoke().await;
        let credential = auth.credential().await.unwrap();

        assert_eq!(credential.access_token(), Some("token-2"));
    }
}
