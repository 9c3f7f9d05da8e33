//! Tenant identifier value object
//!
//! # Examples
//!
//! ```
//! use domain::TenantId;
//!
//! let tenant_id = TenantId::parse("acme-corp").unwrap();
//! assert_eq!(tenant_id.as_str(), "acme-corp");
//!
//! // Empty identifiers are rejected
//! assert!(TenantId::parse("   ").is_err());
//!
//! // Use the default tenant for single-tenant deployments
//! let default = TenantId::default();
//! assert!(default.is_default());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Identifier of the tenant used by single-tenant deployments
const DEFAULT_TENANT: &str = "default";

/// Upper bound on identifier length, keeps index keys and log lines sane
pub(crate) const MAX_IDENTIFIER_LEN: usize = 128;

/// A unique tenant identifier
///
/// Tenants are isolated organizational units within the system. Each tenant
/// has its own data, users, counters and cached services. The identifier is
/// an opaque string handed over by the authentication boundary; the only
/// invariant enforced here is that it is non-empty, bounded and free of
/// control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Parse a tenant ID, rejecting empty or malformed identifiers
    ///
    /// Surrounding whitespace is trimmed before validation.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, DomainError> {
        validate_identifier("tenant id", raw.as_ref()).map(Self)
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this is the default tenant
    ///
    /// # Examples
    ///
    /// ```
    /// use domain::TenantId;
    ///
    /// assert!(TenantId::default().is_default());
    /// assert!(!TenantId::parse("t1").unwrap().is_default());
    /// ```
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_TENANT
    }
}

impl Default for TenantId {
    /// Returns the default tenant ID for single-tenant deployments
    fn default() -> Self {
        Self(DEFAULT_TENANT.to_string())
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for TenantId {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

/// Shared validation for opaque string identifiers
pub(crate) fn validate_identifier(what: &str, raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidContext(format!("{what} must not be empty")));
    }
    if trimmed.len() > MAX_IDENTIFIER_LEN {
        return Err(DomainError::InvalidContext(format!(
            "{what} exceeds {MAX_IDENTIFIER_LEN} characters"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(DomainError::InvalidContext(format!(
            "{what} contains control characters"
        )));
    }
    Ok(trimmed.to_string())
}
