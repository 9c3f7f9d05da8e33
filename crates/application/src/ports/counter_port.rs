//! Tenant-scoped counter port

use async_trait::async_trait;
use domain::{Counter, TenantId};
#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Port for linearizable per-tenant counters
///
/// Concurrent increments of the same `(tenant, name)` key must never lose an
/// update: N concurrent calls from an initial value `v` end at `v + N`.
/// Implementations must use a single atomic statement or an equivalent
/// serialized critical section, never a read followed by a write.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CounterPort: Send + Sync {
    /// Add one and return the new value; a missing counter starts at zero
    async fn increment(&self, tenant_id: &TenantId, name: &str) -> Result<i64, ApplicationError>;

    /// Add `delta` and return the new value
    async fn increment_by(
        &self,
        tenant_id: &TenantId,
        name: &str,
        delta: i64,
    ) -> Result<i64, ApplicationError>;

    /// Current state of a counter, if it was ever incremented
    async fn get(&self, tenant_id: &TenantId, name: &str)
    -> Result<Option<Counter>, ApplicationError>;
}
