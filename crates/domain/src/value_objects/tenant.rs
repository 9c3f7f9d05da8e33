//! Tenant context abstraction for multi-tenant data isolation
//!
//! This module provides the foundational abstractions for multi-tenant support:
//!
//! - [`TenantContext`] - An immutable value carrying tenant, user and permissions
//!   through one logical operation (one request, one queued job)
//! - [`ContextSummary`] - A log-safe projection of a context
//! - [`AuthenticatedPrincipal`] - The triple produced by the authentication boundary
//! - [`TenantAware`] - A trait for entities that belong to a specific tenant
//!
//! # Examples
//!
//! ```
//! use std::collections::BTreeMap;
//! use domain::tenant::TenantContext;
//!
//! let context = TenantContext::create("t1", "alice", ["receipts:write"], BTreeMap::new()).unwrap();
//! assert_eq!(context.tenant_id().as_str(), "t1");
//! assert!(context.has_permission("receipts:write"));
//! assert!(!context.has_permission("admin"));
//!
//! // Missing identity is rejected before any I/O happens
//! assert!(TenantContext::create("", "alice", Vec::<String>::new(), BTreeMap::new()).is_err());
//! ```

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{TenantId, UserId};
use crate::errors::DomainError;

/// Metadata key recording where a context originated
pub const METADATA_ORIGIN: &str = "origin";

/// Context carrying tenant information through the request lifecycle
///
/// A `TenantContext` is created at the start of one logical operation and
/// discarded at its end. It is never persisted. All fields are private and
/// there are no mutating methods, so a context cannot change once built.
///
/// # Thread Safety
///
/// `TenantContext` is `Send + Sync` and can be safely shared across tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
    user_id: UserId,
    permissions: BTreeSet<String>,
    metadata: BTreeMap<String, String>,
    created_at: DateTime<Utc>,
}

impl TenantContext {
    /// Create a context from raw identity strings
    ///
    /// Fails with [`DomainError::InvalidContext`] if `tenant_id` or `user_id`
    /// is empty.
    pub fn create<P, S>(
        tenant_id: &str,
        user_id: &str,
        permissions: P,
        metadata: BTreeMap<String, String>,
    ) -> Result<Self, DomainError>
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tenant_id = TenantId::parse(tenant_id)?;
        let user_id = UserId::parse(user_id)?;
        Ok(Self::new(tenant_id, user_id)
            .with_permissions(permissions)
            .with_metadata(metadata))
    }

    /// Create a context with no permissions and no metadata
    pub fn new(tenant_id: TenantId, user_id: UserId) -> Self {
        Self {
            tenant_id,
            user_id,
            permissions: BTreeSet::new(),
            metadata: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Context for work the platform performs on behalf of a tenant
    ///
    /// Used by the service container when it builds long-lived, tenant-scoped
    /// instances that are not tied to a single inbound request.
    pub fn service(tenant_id: TenantId) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(METADATA_ORIGIN.to_string(), "service".to_string());
        Self::new(tenant_id, UserId::system()).with_metadata(metadata)
    }

    /// Create a tenant context for single-tenant deployments
    pub fn single_tenant(user_id: UserId) -> Self {
        Self::new(TenantId::default(), user_id)
    }

    fn with_permissions<P, S>(mut self, permissions: P) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// The tenant every operation under this context is scoped to
    pub const fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// The user on whose behalf the operation runs
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// All granted permissions
    pub const fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    /// Look up a metadata value
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// When this context was created
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Pure membership test against the permission set
    ///
    /// There is no hierarchy: `"admin"` does not imply any other permission.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Fail with [`DomainError::PermissionDenied`] unless `permission` is granted
    pub fn require_permission(&self, permission: &str) -> Result<(), DomainError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(DomainError::PermissionDenied {
                tenant_id: self.tenant_id.to_string(),
                user_id: self.user_id.to_string(),
                permission: permission.to_string(),
            })
        }
    }

    /// Read-only projection suitable for logging
    ///
    /// Metadata values may carry tokens or personal data, so only the keys
    /// are included.
    pub fn summary(&self) -> ContextSummary {
        ContextSummary {
            tenant_id: self.tenant_id.clone(),
            user_id: self.user_id.clone(),
            permissions: self.permissions.iter().cloned().collect(),
            metadata_keys: self.metadata.keys().cloned().collect(),
            created_at: self.created_at,
        }
    }
}

/// Log-safe view of a [`TenantContext`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextSummary {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub permissions: Vec<String>,
    pub metadata_keys: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Identity triple produced by the authentication boundary
///
/// The core trusts this value completely and never re-derives identity from
/// request payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedPrincipal {
    pub tenant_id: String,
    pub user_id: String,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl AuthenticatedPrincipal {
    /// Turn the principal into a context for one operation
    pub fn into_context(
        self,
        metadata: BTreeMap<String, String>,
    ) -> Result<TenantContext, DomainError> {
        TenantContext::create(&self.tenant_id, &self.user_id, self.permissions, metadata)
    }
}

/// Trait for entities that belong to a specific tenant
pub trait TenantAware {
    /// Get the tenant ID this entity belongs to
    fn tenant_id(&self) -> &TenantId;

    /// Check if this entity belongs to the given tenant
    fn belongs_to(&self, tenant_id: &TenantId) -> bool {
        self.tenant_id() == tenant_id
    }

    /// Check if this entity belongs to the given context's tenant
    fn belongs_to_context(&self, context: &TenantContext) -> bool {
        self.belongs_to(context.tenant_id())
    }
}
