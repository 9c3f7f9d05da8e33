//! Repository bound to a single whitelisted table
//!
//! This is the object the service container hands out per `(tenant, kind)`.
//! It forwards to the tenant-scoped repository with the table fixed, so
//! callers never pass table names around.

use std::fmt;
use std::sync::Arc;

use domain::{Record, TableSchema, TenantAware, TenantContext, TenantId, WriteResult};
use serde_json::Value;

use crate::error::ApplicationError;
use crate::ports::{QueryOptions, TenantRepositoryPort};

/// CRUD over one entity kind for one tenant
#[derive(Clone)]
pub struct EntityRepository {
    inner: Arc<dyn TenantRepositoryPort>,
    schema: &'static TableSchema,
}

impl fmt::Debug for EntityRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRepository")
            .field("table", &self.schema.name)
            .field("tenant_id", self.inner.context().tenant_id())
            .finish_non_exhaustive()
    }
}

fn id_condition(id: i64) -> Record {
    let mut conditions = Record::new();
    conditions.insert("id".to_string(), Value::from(id));
    conditions
}

impl EntityRepository {
    pub fn new(inner: Arc<dyn TenantRepositoryPort>, schema: &'static TableSchema) -> Self {
        Self { inner, schema }
    }

    /// Entity kind, e.g. `"user"`
    pub const fn entity(&self) -> &'static str {
        self.schema.entity
    }

    /// Storage table name
    pub const fn table(&self) -> &'static str {
        self.schema.name
    }

    pub const fn schema(&self) -> &'static TableSchema {
        self.schema
    }

    /// Context of the underlying repository
    pub fn context(&self) -> &TenantContext {
        self.inner.context()
    }

    /// The tenant-scoped repository this wraps
    pub fn inner(&self) -> &Arc<dyn TenantRepositoryPort> {
        &self.inner
    }

    pub async fn create(&self, data: Record) -> Result<Record, ApplicationError> {
        self.inner.create(self.schema.name, data).await
    }

    pub async fn find_one(&self, conditions: Record) -> Result<Option<Record>, ApplicationError> {
        self.inner.find_one(self.schema.name, conditions).await
    }

    /// Record with the given generated id, if it belongs to this tenant
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Record>, ApplicationError> {
        self.find_one(id_condition(id)).await
    }

    pub async fn find_many(
        &self,
        conditions: Record,
        options: &QueryOptions,
    ) -> Result<Vec<Record>, ApplicationError> {
        self.inner
            .find_many(self.schema.name, conditions, options)
            .await
    }

    pub async fn update(
        &self,
        conditions: Record,
        data: Record,
    ) -> Result<WriteResult, ApplicationError> {
        self.inner.update(self.schema.name, conditions, data).await
    }

    pub async fn update_by_id(&self, id: i64, data: Record) -> Result<WriteResult, ApplicationError> {
        self.update(id_condition(id), data).await
    }

    pub async fn delete(&self, conditions: Record) -> Result<WriteResult, ApplicationError> {
        self.inner.delete(self.schema.name, conditions).await
    }

    pub async fn delete_by_id(&self, id: i64) -> Result<WriteResult, ApplicationError> {
        self.delete(id_condition(id)).await
    }

    pub async fn count(&self, conditions: Record) -> Result<u64, ApplicationError> {
        self.inner.count(self.schema.name, conditions).await
    }
}

impl TenantAware for EntityRepository {
    fn tenant_id(&self) -> &TenantId {
        self.inner.context().tenant_id()
    }
}
