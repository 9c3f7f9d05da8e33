//! Tenant-scoped repository port
//!
//! Defines the CRUD surface business logic uses for every whitelisted table.
//! An implementation is bound to exactly one [`TenantContext`] for its whole
//! lifetime and injects that tenant into every statement it issues.

use async_trait::async_trait;
use domain::{Record, TenantContext, WriteResult};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ApplicationError;
use crate::services::schema_guard::parse_numeric_token;

/// Optional ordering and paging for `find_many`
///
/// Values are validated by the schema guard when the query is built; unsafe
/// values are dropped rather than failing the read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    pub order_by: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl QueryOptions {
    /// No ordering, no paging
    pub fn new() -> Self {
        Self::default()
    }

    /// Order by an expression such as `"createdAt DESC"`
    #[must_use]
    pub fn order_by(mut self, expr: impl Into<String>) -> Self {
        self.order_by = Some(expr.into());
        self
    }

    /// Return at most `limit` rows
    #[must_use]
    pub const fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first `offset` rows
    #[must_use]
    pub const fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Build options from raw text parameters (e.g. a query string)
    ///
    /// Non-numeric paging tokens are dropped here.
    pub fn from_params(order_by: Option<&str>, limit: Option<&str>, offset: Option<&str>) -> Self {
        let numeric = |name: &str, raw: Option<&str>| {
            raw.and_then(|raw| {
                parse_numeric_token(raw)
                    .inspect_err(|e| warn!(param = name, error = %e, "Dropping paging parameter"))
                    .ok()
            })
        };
        Self {
            order_by: order_by.map(str::to_string),
            limit: numeric("limit", limit),
            offset: numeric("offset", offset),
        }
    }
}

/// Port for tenant-isolated CRUD over whitelisted tables
///
/// # Implementation Guidelines
///
/// - All queries MUST include the bound tenant in their WHERE clause
/// - Caller-supplied `tenantId` in conditions or data MUST be discarded
/// - Create MUST stamp the tenant from the bound context
/// - Updates MUST NOT change `tenantId` or `id`
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TenantRepositoryPort: Send + Sync {
    /// The context this repository is bound to
    fn context(&self) -> &TenantContext;

    /// Insert a record and return it as stored, including the generated id
    async fn create(&self, table: &str, data: Record) -> Result<Record, ApplicationError>;

    /// First record matching all conditions
    async fn find_one(
        &self,
        table: &str,
        conditions: Record,
    ) -> Result<Option<Record>, ApplicationError>;

    /// All records matching all conditions
    async fn find_many(
        &self,
        table: &str,
        conditions: Record,
        options: &QueryOptions,
    ) -> Result<Vec<Record>, ApplicationError>;

    /// Update matching records
    async fn update(
        &self,
        table: &str,
        conditions: Record,
        data: Record,
    ) -> Result<WriteResult, ApplicationError>;

    /// Delete matching records
    async fn delete(&self, table: &str, conditions: Record)
    -> Result<WriteResult, ApplicationError>;

    /// Number of matching records
    async fn count(&self, table: &str, conditions: Record) -> Result<u64, ApplicationError>;
}
