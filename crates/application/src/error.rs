//! Application-level errors

use domain::DomainError;
use thiserror::Error;

/// Errors that can occur in the application layer
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// Domain-level error (including invalid tenant contexts)
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Table is not whitelisted or its name contains unsafe tokens
    #[error("Table not allowed: {0}")]
    TableNotAllowed(String),

    /// Column, order-by, limit or offset failed validation
    #[error("Unsafe query fragment: {0}")]
    UnsafeQueryFragment(String),

    /// Underlying store failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// No tenant context is bound to the current task
    #[error("No tenant context bound to the current operation")]
    MissingContext,

    /// Requested record or component does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// External service error
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    /// Check if this error is retryable
    ///
    /// Nothing in this layer retries on its own; the flag tells callers and
    /// collaborators whether a retry can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::ExternalService(_))
    }
}
