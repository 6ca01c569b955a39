//! Accounting API access
//!
//! Requests are described as data ([`RequestDescriptor`]), sent through one
//! [`Dispatcher`], and decoded into [`Collection`]s or [`BinaryPayload`]s.
//! [`ResourceAccessor`] ties these together per resource.

pub mod accessor;
pub mod constants;
pub mod dispatch;
pub mod entity;
pub mod files;
pub mod filter;
pub mod http;
pub mod request;
pub mod resilience;
pub mod resource;
pub mod response;
pub mod transport;

pub use accessor::{ResourceAccessor, Session};
pub use dispatch::Dispatcher;
pub use entity::Entity;
pub use files::{FileWriter, FsFileWriter};
pub use filter::Filter;
pub use http::{HttpMethod, RawResponse, RequestBody, RequestDescriptor};
pub use request::{Operation, RequestBuilder, RequestParams};
pub use resilience::{
    ApiLogger, LogLevel, MonitoringConfig, RateLimitConfig, RateLimiter, RateLimiterStats, ResilienceConfig,
    ResilienceProfile, RetryConfig, RetryPolicy, RetryableError,
};
pub use resource::{Capabilities, ResourceDescriptor, resources};
pub use response::{BinaryPayload, Collection, Decoded, ExpectedShape, Outcome, Record, ResponseDecoder, ValidationError};
pub use transport::{ReqwestTransport, Transport};
