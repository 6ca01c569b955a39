//! Client façade
//!
//! [`AccountingApiClient`] owns one authenticated session and exposes an
//! accessor per resource. Clients share nothing; two clients built from the
//! same configuration hold separate credentials and rate limiters.

use log::info;
use std::sync::Arc;

use crate::api::accessor::{ResourceAccessor, Session};
use crate::api::dispatch::Dispatcher;
use crate::api::entity::Entity;
use crate::api::files::{FileWriter, FsFileWriter};
use crate::api::request::RequestBuilder;
use crate::api::resilience::{ApiLogger, RateLimiter, RateLimiterStats, ResilienceConfig, RetryPolicy};
use crate::api::resource::{ResourceDescriptor, resources};
use crate::api::transport::{ReqwestTransport, Transport};
use crate::auth::{
    Authenticator, ClientCredentials, CredentialProvider, PrivateKeySource, RequestSigner, SignedRequest, StaticToken,
};
use crate::config::{AuthConfig, ClientConfig};
use crate::error::{AuthError, Result};

pub struct AccountingApiClient {
    pub accounts: ResourceAccessor,
    pub bank_transactions: ResourceAccessor,
    pub bank_transfers: ResourceAccessor,
    pub contact_groups: ResourceAccessor,
    pub contacts: ResourceAccessor,
    pub credit_notes: ResourceAccessor,
    pub currencies: ResourceAccessor,
    pub employees: ResourceAccessor,
    pub expense_claims: ResourceAccessor,
    pub invoices: ResourceAccessor,
    pub items: ResourceAccessor,
    pub journals: ResourceAccessor,
    pub manual_journals: ResourceAccessor,
    pub organisations: ResourceAccessor,
    pub overpayments: ResourceAccessor,
    pub payments: ResourceAccessor,
    pub prepayments: ResourceAccessor,
    pub purchase_orders: ResourceAccessor,
    pub quotes: ResourceAccessor,
    pub receipts: ResourceAccessor,
    pub repeating_invoices: ResourceAccessor,
    pub tax_rates: ResourceAccessor,
    pub tracking_categories: ResourceAccessor,
    pub users: ResourceAccessor,
    session: Arc<Session>,
}

impl AccountingApiClient {
    /// Client with the default reqwest transport and filesystem writer
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    fn from_session(session: Arc<Session>) -> Self {
        let accessor = |resource: ResourceDescriptor| ResourceAccessor::new(resource, Arc::clone(&session));

        Self {
            accounts: accessor(resources::ACCOUNTS),
            bank_transactions: accessor(resources::BANK_TRANSACTIONS),
            bank_transfers: accessor(resources::BANK_TRANSFERS),
            contact_groups: accessor(resources::CONTACT_GROUPS),
            contacts: accessor(resources::CONTACTS),
            credit_notes: accessor(resources::CREDIT_NOTES),
            currencies: accessor(resources::CURRENCIES),
            employees: accessor(resources::EMPLOYEES),
            expense_claims: accessor(resources::EXPENSE_CLAIMS),
            invoices: accessor(resources::INVOICES),
            items: accessor(resources::ITEMS),
            journals: accessor(resources::JOURNALS),
            manual_journals: accessor(resources::MANUAL_JOURNALS),
            organisations: accessor(resources::ORGANISATIONS),
            overpayments: accessor(resources::OVERPAYMENTS),
            payments: accessor(resources::PAYMENTS),
            prepayments: accessor(resources::PREPAYMENTS),
            purchase_orders: accessor(resources::PURCHASE_ORDERS),
            quotes: accessor(resources::QUOTES),
            receipts: accessor(resources::RECEIPTS),
            repeating_invoices: accessor(resources::REPEATING_INVOICES),
            tax_rates: accessor(resources::TAX_RATES),
            tracking_categories: accessor(resources::TRACKING_CATEGORIES),
            users: accessor(resources::USERS),
            session,
        }
    }

    /// Accessor for a resource described outside the built-in table
    pub fn resource(&self, resource: ResourceDescriptor) -> ResourceAccessor<Entity> {
        ResourceAccessor::new(resource, Arc::clone(&self.session))
    }

    pub fn authenticator(&self) -> &Arc<Authenticator> {
        self.session.dispatcher().authenticator()
    }

    pub fn rate_limiter_stats(&self) -> RateLimiterStats {
        self.session.dispatcher().rate_limiter_stats()
    }
}

/// Builds a client, optionally swapping out collaborators
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    credential_provider: Option<Arc<dyn CredentialProvider>>,
    signer: Option<Arc<dyn RequestSigner>>,
    file_writer: Option<Arc<dyn FileWriter>>,
    resilience: Option<ResilienceConfig>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            credential_provider: None,
            signer: None,
            file_writer: None,
            resilience: None,
        }
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the provider derived from the auth configuration
    pub fn credential_provider(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credential_provider = Some(provider);
        self
    }

    /// Signing algorithm for the `signed_request` scheme
    pub fn signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn file_writer(mut self, file_writer: Arc<dyn FileWriter>) -> Self {
        self.file_writer = Some(file_writer);
        self
    }

    /// Overrides the profile named in the configuration
    pub fn resilience(mut self, resilience: ResilienceConfig) -> Self {
        self.resilience = Some(resilience);
        self
    }

    pub fn build(self) -> Result<AccountingApiClient> {
        let config = self.config;
        let http = ReqwestTransport::new(&config.user_agent, config.timeout())?;

        let provider = match self.credential_provider {
            Some(provider) => provider,
            None => provider_from_config(&config.auth, &http, self.signer)?,
        };
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(http),
        };
        let resilience = self.resilience.unwrap_or_else(|| config.resilience_config());

        let dispatcher = Dispatcher::new(
            transport,
            Arc::new(Authenticator::new(provider)),
            RateLimiter::new(resilience.rate_limit),
            RetryPolicy::new(resilience.retry),
            ApiLogger::new(resilience.monitoring),
        );
        let session = Session::new(
            RequestBuilder::new(&config.endpoint_base, config.tenant_id.clone()),
            dispatcher,
            self.file_writer.unwrap_or_else(|| Arc::new(FsFileWriter)),
        );

        info!(
            "Accounting API client ready for {} ({} authentication)",
            config.endpoint_base,
            config.auth.scheme()
        );
        Ok(AccountingApiClient::from_session(Arc::new(session)))
    }
}

fn provider_from_config(
    auth: &AuthConfig,
    http: &ReqwestTransport,
    signer: Option<Arc<dyn RequestSigner>>,
) -> Result<Arc<dyn CredentialProvider>> {
    let provider: Arc<dyn CredentialProvider> = match auth {
        AuthConfig::Bearer { access_token } => Arc::new(StaticToken::new(access_token.clone())),
        AuthConfig::ClientCredentials {
            consumer_key,
            consumer_secret,
            scopes,
            ..
        } => Arc::new(ClientCredentials::new(
            http.http_client(),
            auth.token_url(),
            consumer_key.clone(),
            consumer_secret.clone(),
            scopes.clone(),
        )),
        AuthConfig::SignedRequest {
            consumer_key,
            private_key,
            private_key_path,
        } => {
            let signer = signer.ok_or_else(|| {
                AuthError::Malformed("signed_request authentication needs a RequestSigner".to_string())
            })?;
            let source = match (private_key, private_key_path) {
                (Some(pem), _) => PrivateKeySource::Inline(pem.clone()),
                (None, Some(path)) => PrivateKeySource::File(path.clone()),
                (None, None) => {
                    return Err(AuthError::MissingCredentials(
                        "signed_request authentication needs a private key".to_string(),
                    )
                    .into());
                }
            };
            Arc::new(SignedRequest::new(consumer_key.clone(), source, signer))
        }
    };
    Ok(provider)
}
