//! API constants and endpoint helpers for the Xero Accounting API

/// Production API host
pub const DEFAULT_ENDPOINT_BASE: &str = "https://api.xero.com";

/// Accounting API path with version
pub const API_PATH: &str = "/api.xro/2.0";

/// OAuth2 token endpoint used by the client-credentials grant
pub const DEFAULT_TOKEN_URL: &str = "https://identity.xero.com/connect/token";

/// Records per page on paginated collections
pub const PAGE_SIZE: usize = 100;

/// Standard headers for accounting requests
pub mod headers {
    pub const ACCEPT: &str = "Accept";
    pub const AUTHORIZATION: &str = "Authorization";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const CONTENT_LENGTH: &str = "Content-Length";
    pub const IF_MODIFIED_SINCE: &str = "If-Modified-Since";
    pub const RETRY_AFTER: &str = "Retry-After";

    /// Selects the organisation an OAuth2 token acts on
    pub const TENANT_ID: &str = "xero-tenant-id";
}

pub mod media_types {
    pub const JSON: &str = "application/json";
    pub const PDF: &str = "application/pdf";
}

/// Query parameter names understood by collection endpoints
pub mod params {
    pub const WHERE: &str = "where";
    pub const ORDER: &str = "order";
    pub const PAGE: &str = "page";
    pub const INCLUDE_ARCHIVED: &str = "includeArchived";
    pub const IDS: &str = "IDs";

    /// `false` makes the server report per-record validation errors inline
    pub const SUMMARIZE_ERRORS: &str = "summarizeErrors";
}

/// Build collection endpoint URL
pub fn resource_endpoint(base_url: &str, resource: &str) -> String {
    format!("{}{}/{}", base_url.trim_end_matches('/'), API_PATH, resource)
}

/// Build single record endpoint URL
pub fn record_endpoint(base_url: &str, resource: &str, id: &str) -> String {
    format!(
        "{}/{}",
        resource_endpoint(base_url, resource),
        urlencoding::encode(id)
    )
}

pub fn default_user_agent() -> String {
    format!("xero-accounting/{}", env!("CARGO_PKG_VERSION"))
}
