//! Tenant-isolated repository over whitelisted tables
//!
//! Every statement is built from a [`TenantContext`] fixed at construction:
//! the tenant filter is appended to every WHERE clause, caller-supplied
//! tenant ids are discarded, and inserted rows are stamped with the bound
//! tenant. The same statement preparation backs the pooled repository and
//! [`TenantTransaction`].

use std::sync::Arc;

use application::{
    ApplicationError, ContextPropagator, OrderTerm, QueryOptions, SchemaGuard, TableRules,
    TenantRepositoryPort,
};
use async_trait::async_trait;
use chrono::Utc;
use domain::schema::{CREATED_AT_COLUMN, ID_COLUMN, TENANT_COLUMN, TENANT_FIELD, UPDATED_AT_COLUMN};
use domain::{Record, TenantContext, WriteResult};
use futures::future::BoxFuture;
use serde_json::Value;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::error::map_sqlx_error;
use super::query_builder::{self, Condition, Paging, SqlValue, Statement};
use super::row_codec::decode_row;

/// Statement preparation and execution shared by pooled and transactional access
#[derive(Debug)]
struct RepositoryCore {
    guard: Arc<SchemaGuard>,
    context: TenantContext,
}

impl RepositoryCore {
    fn tenant_value(&self) -> SqlValue {
        SqlValue::Text(self.context.tenant_id().as_str().to_string())
    }

    /// Remove any caller-supplied tenant from a storage-keyed record
    fn strip_tenant(&self, table: &str, record: &mut Record) {
        for key in [TENANT_COLUMN, TENANT_FIELD] {
            if let Some(supplied) = record.remove(key) {
                let own = supplied.as_str() == Some(self.context.tenant_id().as_str());
                if !own {
                    warn!(
                        table,
                        bound_tenant = %self.context.tenant_id(),
                        supplied_tenant = %supplied,
                        "Discarding foreign tenant id"
                    );
                }
            }
        }
    }

    /// Map, validate and tenant-scope a set of conditions
    fn scope(
        &self,
        rules: &TableRules,
        conditions: Record,
    ) -> Result<Vec<Condition>, ApplicationError> {
        let mut storage = rules.to_columns(conditions);
        self.strip_tenant(rules.table(), &mut storage);

        let mut scoped = storage
            .into_iter()
            .map(|(column, value)| {
                self.guard.validate_column(&column)?;
                let value = SqlValue::from_json(&value, rules.column_kind(&column));
                Ok(Condition::new(column, value))
            })
            .collect::<Result<Vec<_>, ApplicationError>>()?;
        scoped.push(Condition::new(TENANT_COLUMN, self.tenant_value()));
        Ok(scoped)
    }

    /// Map and validate a data record for writing
    fn values(
        &self,
        rules: &TableRules,
        data: Record,
    ) -> Result<Vec<(String, SqlValue)>, ApplicationError> {
        let mut storage = rules.to_columns(data);
        self.strip_tenant(rules.table(), &mut storage);
        storage.remove(ID_COLUMN);

        storage
            .into_iter()
            .map(|(column, value)| {
                self.guard.validate_column(&column)?;
                let value = SqlValue::from_json(&value, rules.column_kind(&column));
                Ok((column, value))
            })
            .collect()
    }

    /// Validate ordering and paging, dropping anything unsafe
    fn paging(&self, rules: &TableRules, options: &QueryOptions) -> Paging {
        let order_by = options
            .order_by
            .as_deref()
            .and_then(|expr| {
                self.guard
                    .validate_order_by(expr)
                    .inspect_err(|e| warn!(table = rules.table(), error = %e, "Dropping order by"))
                    .ok()
            })
            .map(|terms| known_columns(rules, rules.order_terms_to_storage(terms)))
            .unwrap_or_default();

        let limit = options.limit.and_then(|limit| {
            self.guard
                .validate_limit(limit)
                .inspect_err(|e| warn!(table = rules.table(), error = %e, "Dropping limit"))
                .ok()
        });
        let offset = options.offset.and_then(|offset| {
            self.guard
                .validate_offset(offset)
                .inspect_err(|e| warn!(table = rules.table(), error = %e, "Dropping offset"))
                .ok()
        });

        Paging {
            order_by,
            limit,
            offset,
        }
    }

    fn to_external(
        rules: &TableRules,
        rows: &[sqlx::sqlite::SqliteRow],
    ) -> Result<Vec<Record>, ApplicationError> {
        rows.iter()
            .map(|row| decode_row(row, rules).map(|record| rules.from_storage(record)))
            .collect()
    }

    async fn create(
        &self,
        conn: &mut SqliteConnection,
        table: &str,
        data: Record,
    ) -> Result<Record, ApplicationError> {
        let rules = self.guard.validate_table(table)?;
        let now = Utc::now().to_rfc3339();

        let mut values = self.values(rules, data)?;
        values.retain(|(column, _)| column != CREATED_AT_COLUMN && column != UPDATED_AT_COLUMN);
        values.push((TENANT_COLUMN.to_string(), self.tenant_value()));
        values.push((CREATED_AT_COLUMN.to_string(), SqlValue::Text(now.clone())));
        values.push((UPDATED_AT_COLUMN.to_string(), SqlValue::Text(now)));

        let stmt = query_builder::insert(rules.table(), &values);
        let row = stmt
            .query()
            .fetch_one(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;
        let stored = rules.from_storage(decode_row(&row, rules)?);
        debug!(id = ?stored.get("id"), "Record created");
        Ok(stored)
    }

    async fn find_many(
        &self,
        conn: &mut SqliteConnection,
        table: &str,
        conditions: Record,
        paging: Option<&QueryOptions>,
    ) -> Result<Vec<Record>, ApplicationError> {
        let rules = self.guard.validate_table(table)?;
        let scoped = self.scope(rules, conditions)?;
        let paging = paging.map_or_else(
            || Paging {
                limit: Some(1),
                ..Paging::default()
            },
            |options| self.paging(rules, options),
        );

        let stmt = query_builder::select(rules.table(), &scoped, &paging);
        let rows = stmt
            .query()
            .fetch_all(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;
        Self::to_external(rules, &rows)
    }

    async fn update(
        &self,
        conn: &mut SqliteConnection,
        table: &str,
        conditions: Record,
        data: Record,
    ) -> Result<WriteResult, ApplicationError> {
        let rules = self.guard.validate_table(table)?;
        let scoped = self.scope(rules, conditions)?;
        let mut values = self.values(rules, data)?;
        values.retain(|(column, _)| column != CREATED_AT_COLUMN && column != UPDATED_AT_COLUMN);
        if values.is_empty() {
            debug!("Nothing to update");
            return Ok(WriteResult::default());
        }
        values.push((
            UPDATED_AT_COLUMN.to_string(),
            SqlValue::Text(Utc::now().to_rfc3339()),
        ));

        let stmt = query_builder::update(rules.table(), &values, &scoped);
        execute(conn, &stmt).await
    }

    async fn delete(
        &self,
        conn: &mut SqliteConnection,
        table: &str,
        conditions: Record,
    ) -> Result<WriteResult, ApplicationError> {
        let rules = self.guard.validate_table(table)?;
        let scoped = self.scope(rules, conditions)?;
        let stmt = query_builder::delete(rules.table(), &scoped);
        execute(conn, &stmt).await
    }

    async fn count(
        &self,
        conn: &mut SqliteConnection,
        table: &str,
        conditions: Record,
    ) -> Result<u64, ApplicationError> {
        let rules = self.guard.validate_table(table)?;
        let scoped = self.scope(rules, conditions)?;
        let stmt = query_builder::count(rules.table(), &scoped);

        let row = stmt
            .query()
            .fetch_one(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;
        let count: i64 = row.try_get(0).map_err(map_sqlx_error)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

/// Order terms on columns the table actually has
fn known_columns(rules: &TableRules, terms: Vec<OrderTerm>) -> Vec<OrderTerm> {
    terms
        .into_iter()
        .filter(|term| {
            let known = rules.column_kind(&term.column).is_some();
            if !known {
                warn!(table = rules.table(), column = %term.column, "Dropping order by on unknown column");
            }
            known
        })
        .collect()
}

async fn execute(
    conn: &mut SqliteConnection,
    stmt: &Statement,
) -> Result<WriteResult, ApplicationError> {
    let result = stmt
        .query()
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
    Ok(WriteResult::new(result.rows_affected()))
}

fn first(records: Vec<Record>) -> Option<Record> {
    records.into_iter().next()
}

/// Repository bound to one tenant, executing on the shared pool
#[derive(Debug, Clone)]
pub struct SqliteTenantRepository {
    pool: SqlitePool,
    core: Arc<RepositoryCore>,
}

impl SqliteTenantRepository {
    /// Bind a repository to `context`
    pub fn new(pool: SqlitePool, guard: Arc<SchemaGuard>, context: TenantContext) -> Self {
        Self {
            pool,
            core: Arc::new(RepositoryCore { guard, context }),
        }
    }

    /// Bind a repository to the context of the current operation
    pub fn from_current(pool: SqlitePool, guard: Arc<SchemaGuard>) -> Result<Self, ApplicationError> {
        Ok(Self::new(pool, guard, ContextPropagator::require()?))
    }

    /// Start a transaction bound to the same tenant
    pub async fn begin(&self) -> Result<TenantTransaction, ApplicationError> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(TenantTransaction {
            core: Arc::clone(&self.core),
            tx: Mutex::new(Some(tx)),
        })
    }

    /// Run `operation` atomically
    ///
    /// Commits when the operation returns `Ok`; any error rolls back every
    /// write made through the transaction handle.
    ///
    /// ```ignore
    /// repo.transaction(|tx| Box::pin(async move {
    ///     tx.create("categories", category).await?;
    ///     tx.update("receipts", conditions, data).await
    /// }))
    /// .await?;
    /// ```
    #[instrument(skip(self, operation), fields(tenant_id = %self.core.context.tenant_id()))]
    pub async fn transaction<T, F>(&self, operation: F) -> Result<T, ApplicationError>
    where
        T: Send,
        F: for<'t> FnOnce(&'t TenantTransaction) -> BoxFuture<'t, Result<T, ApplicationError>>
            + Send,
    {
        let tx = self.begin().await?;
        match operation(&tx).await {
            Ok(value) => {
                tx.commit().await?;
                debug!("Transaction committed");
                Ok(value)
            },
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                debug!(error = %e, "Transaction rolled back");
                Err(e)
            },
        }
    }

    async fn acquire(&self) -> Result<sqlx::pool::PoolConnection<Sqlite>, ApplicationError> {
        self.pool.acquire().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl TenantRepositoryPort for SqliteTenantRepository {
    fn context(&self) -> &TenantContext {
        &self.core.context
    }

    #[instrument(skip(self, data), fields(tenant_id = %self.core.context.tenant_id()))]
    async fn create(&self, table: &str, data: Record) -> Result<Record, ApplicationError> {
        let mut conn = self.acquire().await?;
        self.core.create(&mut conn, table, data).await
    }

    #[instrument(skip(self, conditions), fields(tenant_id = %self.core.context.tenant_id()))]
    async fn find_one(
        &self,
        table: &str,
        conditions: Record,
    ) -> Result<Option<Record>, ApplicationError> {
        let mut conn = self.acquire().await?;
        let records = self.core.find_many(&mut conn, table, conditions, None).await?;
        Ok(first(records))
    }

    #[instrument(skip(self, conditions, options), fields(tenant_id = %self.core.context.tenant_id()))]
    async fn find_many(
        &self,
        table: &str,
        conditions: Record,
        options: &QueryOptions,
    ) -> Result<Vec<Record>, ApplicationError> {
        let mut conn = self.acquire().await?;
        self.core
            .find_many(&mut conn, table, conditions, Some(options))
            .await
    }

    #[instrument(skip(self, conditions, data), fields(tenant_id = %self.core.context.tenant_id()))]
    async fn update(
        &self,
        table: &str,
        conditions: Record,
        data: Record,
    ) -> Result<WriteResult, ApplicationError> {
        let mut conn = self.acquire().await?;
        self.core.update(&mut conn, table, conditions, data).await
    }

    #[instrument(skip(self, conditions), fields(tenant_id = %self.core.context.tenant_id()))]
    async fn delete(
        &self,
        table: &str,
        conditions: Record,
    ) -> Result<WriteResult, ApplicationError> {
        let mut conn = self.acquire().await?;
        self.core.delete(&mut conn, table, conditions).await
    }

    #[instrument(skip(self, conditions), fields(tenant_id = %self.core.context.tenant_id()))]
    async fn count(&self, table: &str, conditions: Record) -> Result<u64, ApplicationError> {
        let mut conn = self.acquire().await?;
        self.core.count(&mut conn, table, conditions).await
    }
}

/// Tenant-bound repository handle inside an open transaction
///
/// Dropping the handle without committing rolls the transaction back.
pub struct TenantTransaction {
    core: Arc<RepositoryCore>,
    tx: Mutex<Option<Transaction<'static, Sqlite>>>,
}

impl std::fmt::Debug for TenantTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantTransaction")
            .field("tenant_id", self.core.context.tenant_id())
            .finish_non_exhaustive()
    }
}

impl TenantTransaction {
    /// Make every write durable
    pub async fn commit(self) -> Result<(), ApplicationError> {
        match self.tx.into_inner() {
            Some(tx) => tx.commit().await.map_err(map_sqlx_error),
            None => Ok(()),
        }
    }

    /// Discard every write
    pub async fn rollback(self) -> Result<(), ApplicationError> {
        match self.tx.into_inner() {
            Some(tx) => tx.rollback().await.map_err(map_sqlx_error),
            None => Ok(()),
        }
    }
}

fn finished() -> ApplicationError {
    ApplicationError::Internal("transaction already finished".to_string())
}

#[async_trait]
impl TenantRepositoryPort for TenantTransaction {
    fn context(&self) -> &TenantContext {
        &self.core.context
    }

    async fn create(&self, table: &str, data: Record) -> Result<Record, ApplicationError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(finished)?;
        self.core.create(&mut **tx, table, data).await
    }

    async fn find_one(
        &self,
        table: &str,
        conditions: Record,
    ) -> Result<Option<Record>, ApplicationError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(finished)?;
        let records = self.core.find_many(&mut **tx, table, conditions, None).await?;
        Ok(first(records))
    }

    async fn find_many(
        &self,
        table: &str,
        conditions: Record,
        options: &QueryOptions,
    ) -> Result<Vec<Record>, ApplicationError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(finished)?;
        self.core
            .find_many(&mut **tx, table, conditions, Some(options))
            .await
    }

    async fn update(
        &self,
        table: &str,
        conditions: Record,
        data: Record,
    ) -> Result<WriteResult, ApplicationError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(finished)?;
        self.core.update(&mut **tx, table, conditions, data).await
    }

    async fn delete(
        &self,
        table: &str,
        conditions: Record,
    ) -> Result<WriteResult, ApplicationError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(finished)?;
        self.core.delete(&mut **tx, table, conditions).await
    }

    async fn count(&self, table: &str, conditions: Record) -> Result<u64, ApplicationError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(finished)?;
        self.core.count(&mut **tx, table, conditions).await
    }
}

#[cfg(test)]
mod tests {
    use domain::{TenantId, UserId};
    use serde_json::json;

    use super::*;
    use crate::persistence::AsyncDatabase;

    async fn repo(tenant: &str) -> (AsyncDatabase, SqliteTenantRepository) {
        let db = AsyncDatabase::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let context = TenantContext::new(TenantId::parse(tenant).unwrap(), UserId::system());
        let repo = SqliteTenantRepository::new(
            db.pool().clone(),
            Arc::new(SchemaGuard::default()),
            context,
        );
        (db, repo)
    }

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test records are objects"),
        }
    }

    #[tokio::test]
    async fn create_stamps_timestamps_and_tenant() {
        let (_db, repo) = repo("t1").await;
        let stored = repo
            .create("users", record(json!({ "displayName": "Ada", "isActive": true })))
            .await
            .unwrap();

        assert_eq!(stored.get("tenantId"), Some(&json!("t1")));
        assert_eq!(stored.get("isActive"), Some(&json!(true)));
        assert!(stored.get("createdAt").is_some_and(Value::is_string));
        assert!(stored.get("id").is_some_and(Value::is_i64));
    }

    #[tokio::test]
    async fn caller_supplied_id_is_ignored() {
        let (_db, repo) = repo("t1").await;
        let stored = repo
            .create("users", record(json!({ "id": 999, "displayName": "Ada" })))
            .await
            .unwrap();
        assert_ne!(stored.get("id"), Some(&json!(999)));
    }

    #[tokio::test]
    async fn unsafe_condition_key_is_rejected() {
        let (_db, repo) = repo("t1").await;
        let result = repo
            .find_one("users", record(json!({ "1=1 OR name": "x" })))
            .await;
        assert!(matches!(result, Err(ApplicationError::UnsafeQueryFragment(_))));
    }

    #[tokio::test]
    async fn empty_update_changes_nothing() {
        let (_db, repo) = repo("t1").await;
        repo.create("users", record(json!({ "displayName": "Ada" })))
            .await
            .unwrap();

        let result = repo
            .update("users", Record::new(), record(json!({ "tenantId": "t2", "id": 5 })))
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn json_columns_round_trip() {
        let (_db, repo) = repo("t1").await;
        let stored = repo
            .create(
                "receipts",
                record(json!({ "receiptNumber": "RCP-000001", "rawFields": { "vat": [7, 19] } })),
            )
            .await
            .unwrap();
        assert_eq!(stored.get("rawFields"), Some(&json!({ "vat": [7, 19] })));
    }

    #[tokio::test]
    async fn null_condition_matches_missing_values() {
        let (_db, repo) = repo("t1").await;
        repo.create("users", record(json!({ "displayName": "Ada" })))
            .await
            .unwrap();
        repo.create("users", record(json!({ "displayName": "Bob", "email": "b@example.com" })))
            .await
            .unwrap();

        let count = repo
            .count("users", record(json!({ "email": null })))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
