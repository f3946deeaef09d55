//! Error types for the remote catalog client.
//!
//! Retryability is a property of the error variant, assigned where the
//! error is produced. Nothing in the crate inspects error messages to
//! decide behavior.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the remote catalog client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Invalid or incomplete client configuration. Fatal before any
    /// remote call is made.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Login was rejected by the remote catalog.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The session token was rejected mid-session (HTTP 401). The client
    /// re-authenticates once and retries the original call before
    /// surfacing this.
    #[error("authentication expired")]
    AuthExpired,

    /// Connection-level failure (DNS, refused, reset). Retryable.
    #[error("network error: {0}")]
    Network(String),

    /// The call exceeded its timeout. Retryable.
    #[error("request timed out")]
    Timeout,

    /// The remote returned a non-success HTTP status.
    ///
    /// 429 and 502/503/504 are transient and retryable; other statuses
    /// are fatal for the call.
    #[error("remote returned status {code}: {message}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Creates a status error.
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Network(_) | ClientError::Timeout => true,
            ClientError::Status { code, .. } => matches!(code, 429 | 502 | 503 | 504),
            ClientError::Configuration(_)
            | ClientError::AuthenticationFailed(_)
            | ClientError::AuthExpired
            | ClientError::InvalidResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_connect() || err.is_request() {
            ClientError::Network(err.to_string())
        } else if err.is_decode() {
            ClientError::InvalidResponse(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}
