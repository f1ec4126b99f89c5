//! CRM error types

use thiserror::Error;

/// Result type for CRM operations
pub type CrmResult<T> = std::result::Result<T, CrmError>;

/// Errors returned by the webhook client
#[derive(Debug, Error)]
pub enum CrmError {
    /// Transport failure (connection, timeout, TLS)
    #[error("HTTP error calling {method}: {source}")]
    Http {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status
    #[error("{method} returned HTTP {status}: {message}")]
    Status {
        method: String,
        status: u16,
        message: String,
    },

    /// The envelope carried an `error` field
    #[error("{method} failed: {code}: {description}")]
    Api {
        method: String,
        code: String,
        description: String,
    },

    /// Response body is not the expected JSON
    #[error("invalid response from {method}: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    /// Invalid webhook URL or client configuration
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl CrmError {
    /// HTTP status of a [`CrmError::Status`] error
    pub fn status(&self) -> Option<u16> {
        match self {
            CrmError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server answered, but refused the request.
    pub fn is_rejection(&self) -> bool {
        matches!(self, CrmError::Status { .. } | CrmError::Api { .. })
    }
}
