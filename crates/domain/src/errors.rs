//! Domain-level errors

use thiserror::Error;

/// Errors raised by domain values before any I/O happens
#[derive(Debug, Error)]
pub enum DomainError {
    /// Tenant or user identity is missing or malformed
    #[error("Invalid context: {0}")]
    InvalidContext(String),

    /// A name or value failed its format rules
    #[error("Validation failed: {0}")]
    ValidationError(String),

    /// The caller's context lacks a required permission
    #[error("Permission {permission:?} not granted to {user_id} in tenant {tenant_id}")]
    PermissionDenied {
        tenant_id: String,
        user_id: String,
        permission: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_context_error_message() {
        let err = DomainError::InvalidContext("tenant id must not be empty".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid context: tenant id must not be empty"
        );
    }

    #[test]
    fn validation_error_message() {
        let err = DomainError::ValidationError("invalid lock name \"\"".to_string());
        assert_eq!(err.to_string(), "Validation failed: invalid lock name \"\"");
    }
}
