//! Async client for the Xero Accounting API
//!
//! ```no_run
//! use xero_accounting::{AccountingApiClient, ClientConfig, Filter};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = AccountingApiClient::new(ClientConfig::from_env()?)?;
//! let invoices = client.invoices.get(&Filter::new().where_clause("Status==\"AUTHORISED\"")).await?;
//! for record in &invoices {
//!     println!("{:?}", record.entity.get_str("InvoiceNumber"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;

pub use api::{BinaryPayload, Collection, Entity, Filter, Outcome, Record, ResourceAccessor, ValidationError};
pub use client::{AccountingApiClient, ClientBuilder};
pub use config::{AuthConfig, ClientConfig};
pub use error::{ApiError, AuthError, Result};
