//! Error taxonomy for the accounting API client
//!
//! Every failure that can reach a caller is an [`ApiError`]. Records the
//! server rejected inside an otherwise successful batch are *not* errors;
//! they come back as data on [`crate::api::Record`].

use std::path::PathBuf;
use thiserror::Error;

/// Credential acquisition, refresh or signing failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no credentials configured: {0}")]
    MissingCredentials(String),

    #[error("malformed credentials: {0}")]
    Malformed(String),

    /// The token endpoint answered with a non-success status
    #[error("token exchange failed with status {status}: {body}")]
    Exchange { status: u16, body: String },

    /// The token endpoint could not be reached
    #[error("token exchange failed: {0}")]
    Transport(String),

    #[error("request signing failed: {0}")]
    Signing(String),
}

/// Errors returned by resource accessors and the dispatch pipeline
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Caller misuse, e.g. a missing identity for a single-record operation
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The server rejected the whole request
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body could not be decoded into the expected shape
    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("unexpected content type: expected {expected}, got {actual}")]
    UnexpectedContentType { expected: String, actual: String },

    #[error("failed to write {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Network-level failure with no HTTP status
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("failed to serialize request body: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_accessor() {
        let err = ApiError::Http { status: 401, body: "unauthorized".to_string() };
        assert_eq!(err.status(), Some(401));
        assert!(err.is_unauthorized());

        let err = ApiError::Decode("truncated".to_string());
        assert_eq!(err.status(), None);
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_auth_error_converts() {
        let err: ApiError = AuthError::Malformed("bad key".to_string()).into();
        assert!(matches!(err, ApiError::Auth(AuthError::Malformed(_))));
        assert_eq!(err.to_string(), "authentication failed: malformed credentials: bad key");
    }

    #[test]
    fn test_file_write_display() {
        let err = ApiError::FileWrite {
            path: PathBuf::from("/tmp/invoice.pdf"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "failed to write /tmp/invoice.pdf: denied");
    }
}
