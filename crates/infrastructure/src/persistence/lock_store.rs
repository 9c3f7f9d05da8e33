//! Named resource locks shared across tenants
//!
//! Acquisition is one upsert that only overwrites an expired row; the
//! `RETURNING` clause yields a row exactly when the caller won. Timestamps are
//! stored as Unix epoch milliseconds. A takeover always carries a strictly
//! later `acquired_at` than the holding it replaces, so `(id, acquired_at)`
//! identifies one holding for [`LockPort::release_held`].

use std::time::Duration;

use application::{ApplicationError, ContextPropagator, LockPort};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{DomainError, LockOutcome, ResourceLock, TenantId};
use sqlx::SqlitePool;
use tracing::{debug, info, instrument, warn};

use super::error::map_sqlx_error;

/// Longest accepted lock name
const MAX_LOCK_NAME_LEN: usize = 128;

type LockRow = (i64, Option<String>, String, i64, Option<i64>);

/// Lock manager backed by the `resource_locks` table
#[derive(Debug, Clone)]
pub struct SqliteLockManager {
    pool: SqlitePool,
}

impl SqliteLockManager {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn validate_name(name: &str) -> Result<(), ApplicationError> {
    if name.trim().is_empty() || name.len() > MAX_LOCK_NAME_LEN {
        return Err(DomainError::ValidationError(format!("invalid lock name {name:?}")).into());
    }
    Ok(())
}

fn to_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>, ApplicationError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| ApplicationError::Storage(format!("invalid lock timestamp {millis}")))
}

fn into_lock(row: LockRow) -> Result<ResourceLock, ApplicationError> {
    let (id, tenant_id, name, acquired_at, expires_at) = row;
    Ok(ResourceLock {
        id,
        tenant_id: tenant_id.map(TenantId::parse).transpose()?,
        name,
        acquired_at: from_millis(acquired_at)?,
        expires_at: expires_at.map(from_millis).transpose()?,
    })
}

#[async_trait]
impl LockPort for SqliteLockManager {
    #[instrument(skip(self))]
    async fn acquire(
        &self,
        name: &str,
        ttl: Option<Duration>,
    ) -> Result<LockOutcome, ApplicationError> {
        validate_name(name)?;

        let now = Utc::now().timestamp_millis();
        let expires_at = ttl.map(|ttl| now.saturating_add(to_millis(ttl)));
        let holder = ContextPropagator::with_current(|c| c.tenant_id().as_str().to_string());

        let row: Option<LockRow> = sqlx::query_as(
            r"
            INSERT INTO resource_locks (tenant_id, name, acquired_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT(name) DO UPDATE SET
                tenant_id = excluded.tenant_id,
                acquired_at = excluded.acquired_at,
                expires_at = excluded.expires_at
            WHERE resource_locks.expires_at IS NOT NULL
              AND resource_locks.expires_at <= excluded.acquired_at
              AND resource_locks.acquired_at < excluded.acquired_at
            RETURNING id, tenant_id, name, acquired_at, expires_at
            ",
        )
        .bind(holder)
        .bind(name)
        .bind(now)
        .bind(expires_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => {
                debug!("Lock granted");
                Ok(LockOutcome::Granted(into_lock(row)?))
            },
            None => {
                debug!("Lock already held");
                Ok(LockOutcome::AlreadyLocked)
            },
        }
    }

    #[instrument(skip(self))]
    async fn release(&self, name: &str) -> Result<bool, ApplicationError> {
        let result = sqlx::query("DELETE FROM resource_locks WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, lock), fields(name = %lock.name, id = lock.id))]
    async fn release_held(&self, lock: &ResourceLock) -> Result<bool, ApplicationError> {
        let result = sqlx::query(
            "DELETE FROM resource_locks WHERE id = $1 AND name = $2 AND acquired_at = $3",
        )
        .bind(lock.id)
        .bind(&lock.name)
        .bind(lock.acquired_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let released = result.rows_affected() > 0;
        if !released {
            warn!("Lock was taken over before release");
        }
        Ok(released)
    }

    async fn is_locked(&self, name: &str) -> Result<bool, ApplicationError> {
        Ok(self.holder(name).await?.is_some())
    }

    #[instrument(skip(self))]
    async fn holder(&self, name: &str) -> Result<Option<ResourceLock>, ApplicationError> {
        let row: Option<LockRow> = sqlx::query_as(
            r"
            SELECT id, tenant_id, name, acquired_at, expires_at
            FROM resource_locks
            WHERE name = $1 AND (expires_at IS NULL OR expires_at > $2)
            ",
        )
        .bind(name)
        .bind(Utc::now().timestamp_millis())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(into_lock).transpose()
    }

    #[instrument(skip(self))]
    async fn sweep_expired(&self) -> Result<u64, ApplicationError> {
        let result = sqlx::query(
            "DELETE FROM resource_locks WHERE expires_at IS NOT NULL AND expires_at <= $1",
        )
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let removed = result.rows_affected();
        if removed > 0 {
            info!(removed, "Swept expired locks");
        }
        Ok(removed)
    }
}
