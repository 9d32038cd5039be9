//! Transport error types with timeout classification.

use thiserror::Error;

/// Error raised while talking to either REST collaborator.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The client could not be constructed from its configuration.
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Network-level failure (connect, DNS, broken transfer).
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be decoded into the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Authentication was rejected by the endpoint.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The endpoint reported a missing resource.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success response, with the endpoint's own detail
    /// preserved for diagnosis.
    #[error("API error (HTTP {status}): {detail}")]
    Api { status: u16, detail: String },
}

impl ClientError {
    /// Whether this error is a request timeout. Timeouts get exactly one
    /// retry on the paginated-collection path; every other error is
    /// terminal for that call.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout(_))
    }

    /// The HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(err.to_string())
        } else if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
