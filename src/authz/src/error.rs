//! Error types for the authorization core

use thiserror::Error;

/// Authorization core errors
///
/// A denied access check is not an error; it is a normal
/// [`AccessDecision`](crate::engine::AccessDecision) with `allowed == false`.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Malformed input rejected before evaluation
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced entity does not exist
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind (account, role, group, permission, resource)
        kind: &'static str,
        /// Requested identifier
        id: String,
    },

    /// A long-running operation was aborted before it published anything
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Repository backend error
    #[error("Database error: {0}")]
    Database(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthzError {
    /// Shorthand for a [`AuthzError::NotFound`] error
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
