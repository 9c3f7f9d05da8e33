//! User identifier value object

use std::fmt;

use serde::{Deserialize, Serialize};

use super::tenant_id::validate_identifier;
use crate::errors::DomainError;

/// User id assigned to contexts created by the platform itself
const SYSTEM_USER: &str = "system";

/// A user identifier, unique within its tenant
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Parse a user ID, rejecting empty or malformed identifiers
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, DomainError> {
        validate_identifier("user id", raw.as_ref()).map(Self)
    }

    /// The principal used for work the platform performs on a tenant's behalf
    pub fn system() -> Self {
        Self(SYSTEM_USER.to_string())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this is the system principal
    pub fn is_system(&self) -> bool {
        self.0 == SYSTEM_USER
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for UserId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}
