//! SDK Error Types
//!
//! Defines error types for the Bionic Memory SDK.

use thiserror::Error;

/// SDK Result type alias
pub type SDKResult<T> = Result<T, SDKError>;

/// SDK errors
#[derive(Debug, Error)]
pub enum SDKError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigValidationError),

    /// Memory engine error
    #[error(transparent)]
    Core(#[from] bionic_core::Error),

    /// HTTP transport error talking to a collaborator
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Collaborator returned something outside its response contract
    #[error("{service} returned a malformed response: {message}")]
    MalformedResponse { service: String, message: String },

    /// Timeout error
    #[error("operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SDKError {
    /// Create a malformed response error
    pub fn malformed(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Check if this error is a timeout error
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Http(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Check if this error is an access denied error
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_access_denied())
    }

    /// Check if this error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_not_found())
    }

    /// Fold into a core collaborator error for the named service.
    pub fn into_collaborator(self, service: &str) -> bionic_core::Error {
        match self {
            Self::Core(e) => e,
            other => bionic_core::Error::collaborator(service, other.to_string()),
        }
    }
}
