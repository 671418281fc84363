//! Error types for bionic-core.

use thiserror::Error;

/// Result type alias using bionic-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for memory engine operations
#[derive(Error, Debug)]
pub enum Error {
    // Construction errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Collaborator errors (vector store, embedder, summarizer)
    #[error("{service} error: {message}")]
    Collaborator { service: String, message: String },

    // Tenant isolation
    #[error("Access denied: user {user_id} cannot {operation} record owned by {record_user_id}")]
    AccessDenied {
        user_id: String,
        record_user_id: String,
        operation: String,
    },

    // Clustering errors
    #[error("Clustering error: {0}")]
    Clustering(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Cleanup job not found: {0}")]
    JobNotFound(String),

    // Database errors
    #[cfg(feature = "db")]
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a collaborator error for the named service
    pub fn collaborator(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create an access denied error
    pub fn access_denied(
        user_id: impl Into<String>,
        record_user_id: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self::AccessDenied {
            user_id: user_id.into(),
            record_user_id: record_user_id.into(),
            operation: operation.into(),
        }
    }

    /// Create a clustering error
    pub fn clustering(msg: impl Into<String>) -> Self {
        Self::Clustering(msg.into())
    }

    /// Check if this is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Check if this is a collaborator failure
    pub fn is_collaborator(&self) -> bool {
        matches!(self, Self::Collaborator { .. })
    }

    /// Check if this is an access denied error
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::CollectionNotFound(_) | Self::JobNotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
