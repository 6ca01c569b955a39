//! Credential state and the providers that produce it

pub mod authenticator;
pub mod credentials;
pub mod providers;

pub use authenticator::{Authenticator, DEFAULT_EXPIRY_SKEW};
pub use credentials::{Credential, CredentialKind, RequestSigner, SigningKey};
pub use providers::{ClientCredentials, CredentialProvider, PrivateKeySource, SignedRequest, StaticToken};
