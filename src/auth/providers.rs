//! Credential providers: the collaborators that perform the actual exchange

use async_trait::async_trait;
use log::{debug, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use super::credentials::{Credential, RequestSigner, SigningKey};
use crate::error::AuthError;

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 1800;

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Produce a fresh credential. `previous` is the credential being
    /// replaced, if any, so providers can use its refresh token.
    async fn acquire(&self, previous: Option<&Credential>) -> Result<Credential, AuthError>;
}

/// Fixed bearer token supplied by the caller
pub struct StaticToken {
    access_token: String,
}

impl StaticToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn acquire(&self, _previous: Option<&Credential>) -> Result<Credential, AuthError> {
        if self.access_token.trim().is_empty() {
            return Err(AuthError::MissingCredentials("access token is empty".to_string()));
        }
        Ok(Credential::bearer(self.access_token.clone(), None))
    }
}

/// OAuth2 client-credentials grant against the identity token endpoint
pub struct ClientCredentials {
    http_client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scopes: Vec<String>,
}

impl ClientCredentials {
    pub fn new(
        http_client: reqwest::Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            http_client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes,
        }
    }
}

#[async_trait]
impl CredentialProvider for ClientCredentials {
    async fn acquire(&self, previous: Option<&Credential>) -> Result<Credential, AuthError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(AuthError::MissingCredentials(
                "consumer key and consumer secret are required".to_string(),
            ));
        }

        let mut form: Vec<(&str, String)> = Vec::new();
        match previous.and_then(Credential::refresh_token) {
            Some(refresh_token) => {
                form.push(("grant_type", "refresh_token".to_string()));
                form.push(("refresh_token", refresh_token.to_string()));
            }
            None => form.push(("grant_type", "client_credentials".to_string())),
        }
        if !self.scopes.is_empty() {
            form.push(("scope", self.scopes.join(" ")));
        }

        info!("Requesting access token from {}", self.token_url);

        let response = self
            .http_client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        debug!("Token request status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Exchange {
                status: status.as_u16(),
                body,
            });
        }

        let token_data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AuthError::Malformed(format!("token response is not JSON: {}", e)))?;

        let access_token = token_data
            .get("access_token")
            .and_then(|t| t.as_str())
            .ok_or_else(|| AuthError::Malformed("no access_token in token response".to_string()))?;

        let expires_in = token_data
            .get("expires_in")
            .and_then(|e| e.as_u64())
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);

        let refresh_token = token_data
            .get("refresh_token")
            .and_then(|t| t.as_str())
            .map(|s| s.to_string());

        info!("Obtained access token valid for {}s", expires_in);

        Ok(Credential::bearer(
            access_token,
            Some(SystemTime::now() + Duration::from_secs(expires_in)),
        )
        .with_refresh_token(refresh_token))
    }
}

/// Where the signing key comes from
#[derive(Debug, Clone)]
pub enum PrivateKeySource {
    Inline(String),
    File(PathBuf),
}

/// Signed-request scheme: every request is signed by a caller-supplied
/// [`RequestSigner`] with the consumer key and private key
pub struct SignedRequest {
    consumer_key: String,
    private_key: PrivateKeySource,
    signer: Arc<dyn RequestSigner>,
}

impl SignedRequest {
    pub fn new(
        consumer_key: impl Into<String>,
        private_key: PrivateKeySource,
        signer: Arc<dyn RequestSigner>,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            private_key,
            signer,
        }
    }
}

#[async_trait]
impl CredentialProvider for SignedRequest {
    async fn acquire(&self, _previous: Option<&Credential>) -> Result<Credential, AuthError> {
        if self.consumer_key.is_empty() {
            return Err(AuthError::MissingCredentials("consumer key is required".to_string()));
        }

        let private_key = match &self.private_key {
            PrivateKeySource::Inline(pem) => pem.clone(),
            PrivateKeySource::File(path) => {
                debug!("Loading private key from {:?}", path);
                tokio::fs::read_to_string(path).await.map_err(|e| {
                    AuthError::Malformed(format!("unable to read private key {:?}: {}", path, e))
                })?
            }
        };
        if private_key.trim().is_empty() {
            return Err(AuthError::Malformed("private key is empty".to_string()));
        }

        Ok(Credential::signed(
            SigningKey {
                consumer_key: self.consumer_key.clone(),
                private_key,
            },
            Arc::clone(&self.signer),
        ))
    }
}
