//! Linearizable per-tenant counters
//!
//! Each increment is a single upsert with `RETURNING`, so SQLite's write
//! serialization makes concurrent increments of one key lose nothing.

use application::{ApplicationError, CounterPort};
use async_trait::async_trait;
use chrono::Utc;
use domain::{Counter, DomainError, TenantId};
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::error::map_sqlx_error;

/// Longest accepted counter name
const MAX_COUNTER_NAME_LEN: usize = 128;

/// Counter store backed by the `counters` table
#[derive(Debug, Clone)]
pub struct SqliteCounterStore {
    pool: SqlitePool,
}

impl SqliteCounterStore {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn validate_name(name: &str) -> Result<(), ApplicationError> {
    if name.trim().is_empty() || name.len() > MAX_COUNTER_NAME_LEN {
        return Err(DomainError::ValidationError(format!("invalid counter name {name:?}")).into());
    }
    Ok(())
}

#[async_trait]
impl CounterPort for SqliteCounterStore {
    async fn increment(&self, tenant_id: &TenantId, name: &str) -> Result<i64, ApplicationError> {
        self.increment_by(tenant_id, name, 1).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn increment_by(
        &self,
        tenant_id: &TenantId,
        name: &str,
        delta: i64,
    ) -> Result<i64, ApplicationError> {
        validate_name(name)?;

        let value: i64 = sqlx::query_scalar(
            r"
            INSERT INTO counters (tenant_id, name, value, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT(tenant_id, name) DO UPDATE SET
                value = counters.value + excluded.value,
                updated_at = excluded.updated_at
            RETURNING value
            ",
        )
        .bind(tenant_id.as_str())
        .bind(name)
        .bind(delta)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(value, "Counter incremented");
        Ok(value)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn get(
        &self,
        tenant_id: &TenantId,
        name: &str,
    ) -> Result<Option<Counter>, ApplicationError> {
        let row: Option<(i64, String, i64)> = sqlx::query_as(
            "SELECT id, name, value FROM counters WHERE tenant_id = $1 AND name = $2",
        )
        .bind(tenant_id.as_str())
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|(id, name, value)| Counter {
            id,
            tenant_id: tenant_id.clone(),
            name,
            value,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::AsyncDatabase;

    async fn store() -> (AsyncDatabase, SqliteCounterStore) {
        let db = AsyncDatabase::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let store = SqliteCounterStore::new(db.pool().clone());
        (db, store)
    }

    fn tenant(raw: &str) -> TenantId {
        TenantId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn missing_counter_starts_at_zero() {
        let (_db, store) = store().await;
        assert!(store.get(&tenant("t1"), "receipts").await.unwrap().is_none());
        assert_eq!(store.increment(&tenant("t1"), "receipts").await.unwrap(), 1);
        assert_eq!(store.increment(&tenant("t1"), "receipts").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn counters_are_per_tenant() {
        let (_db, store) = store().await;
        store.increment_by(&tenant("t1"), "n", 10).await.unwrap();
        store.increment(&tenant("t2"), "n").await.unwrap();

        assert_eq!(store.get(&tenant("t1"), "n").await.unwrap().unwrap().value, 10);
        assert_eq!(store.get(&tenant("t2"), "n").await.unwrap().unwrap().value, 1);
    }

    #[tokio::test]
    async fn negative_delta_decrements() {
        let (_db, store) = store().await;
        store.increment_by(&tenant("t1"), "n", 5).await.unwrap();
        assert_eq!(store.increment_by(&tenant("t1"), "n", -2).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let (_db, store) = store().await;
        assert!(matches!(
            store.increment(&tenant("t1"), "  ").await,
            Err(ApplicationError::Domain(DomainError::ValidationError(_)))
        ));
    }
}
