//! Subcommand implementations
//!
//! Each command returns the text to print so it can be checked without a
//! terminal.

use std::fmt::Write as _;

use application::{CounterPort, LockPort, SchemaGuard};
use domain::TenantId;
use infrastructure::{AppConfig, AsyncDatabase, SqliteCounterStore, SqliteLockManager};
use tracing::{debug, info};

/// Open the configured database, migrating it when configured to
async fn open(config: &AppConfig) -> anyhow::Result<AsyncDatabase> {
    let db = AsyncDatabase::new(&config.database.to_async_config()).await?;
    if config.database.run_migrations {
        db.migrate().await?;
        debug!("Migrations checked");
    }
    Ok(db)
}

pub async fn migrate(config: &AppConfig) -> anyhow::Result<String> {
    let db = AsyncDatabase::new(&config.database.to_async_config()).await?;
    db.migrate().await?;
    db.close().await;
    info!(url = %config.database.url, "Migrations applied");
    Ok(format!("Migrations applied to {}", config.database.url))
}

pub async fn sweep_locks(config: &AppConfig) -> anyhow::Result<String> {
    let db = open(config).await?;
    let removed = SqliteLockManager::new(db.pool().clone())
        .sweep_expired()
        .await?;
    db.close().await;
    Ok(format!("Removed {removed} expired lock(s)"))
}

pub async fn lock_status(config: &AppConfig, name: &str) -> anyhow::Result<String> {
    let db = open(config).await?;
    let holder = SqliteLockManager::new(db.pool().clone()).holder(name).await?;
    db.close().await;

    let Some(lock) = holder else {
        return Ok(format!("{name}: free"));
    };
    let owner = lock
        .tenant_id
        .as_ref()
        .map_or_else(|| "no tenant".to_string(), |t| format!("tenant {t}"));
    let expiry = lock
        .expires_at
        .map_or_else(|| "never expires".to_string(), |e| format!("expires {}", e.to_rfc3339()));
    Ok(format!(
        "{name}: held by {owner} since {}, {expiry}",
        lock.acquired_at.to_rfc3339()
    ))
}

pub async fn counter(
    config: &AppConfig,
    tenant: &str,
    name: &str,
    increment: bool,
) -> anyhow::Result<String> {
    let tenant_id = TenantId::parse(tenant)?;
    let db = open(config).await?;
    let counters = SqliteCounterStore::new(db.pool().clone());

    let value = if increment {
        counters.increment(&tenant_id, name).await?
    } else {
        counters
            .get(&tenant_id, name)
            .await?
            .map_or(0, |counter| counter.value)
    };
    db.close().await;
    Ok(format!("{tenant_id}/{name} = {value}"))
}

pub fn tables(config: &AppConfig) -> String {
    let guard = SchemaGuard::new(domain::schema::TABLES, config.tenancy.max_page_size);
    let mut out = String::new();
    for table in guard.tables() {
        let _ = writeln!(out, "{} (entity: {})", table.name, table.entity);
        for field in table.all_fields() {
            let _ = writeln!(
                out,
                "  {:<16} -> {:<18} {:?}",
                field.external, field.column, field.kind
            );
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use infrastructure::DatabaseConfig;
    use tempfile::TempDir;

    use super::*;

    fn config(dir: &TempDir) -> AppConfig {
        AppConfig {
            database: DatabaseConfig {
                url: format!("sqlite:{}", dir.path().join("cli.db").display()),
                ..DatabaseConfig::default()
            },
            ..AppConfig::default()
        }
    }

    #[test]
    fn tables_lists_whitelist_with_mappings() {
        let out = tables(&AppConfig::default());
        assert!(out.contains("users (entity: user)"));
        assert!(out.contains("displayName"));
        assert!(out.contains("display_name"));
        assert!(!out.contains("resource_locks"));
    }

    #[tokio::test]
    async fn counter_reads_zero_then_increments() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);

        assert_eq!(counter(&config, "acme", "seq", false).await.unwrap(), "acme/seq = 0");
        assert_eq!(counter(&config, "acme", "seq", true).await.unwrap(), "acme/seq = 1");
        assert_eq!(counter(&config, "acme", "seq", true).await.unwrap(), "acme/seq = 2");
    }

    #[tokio::test]
    async fn counter_rejects_blank_tenant() {
        let dir = tempfile::tempdir().unwrap();
        assert!(counter(&config(&dir), "  ", "seq", true).await.is_err());
    }

    #[tokio::test]
    async fn lock_commands_on_fresh_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);

        migrate(&config).await.unwrap();
        assert_eq!(lock_status(&config, "export-sink").await.unwrap(), "export-sink: free");
        assert_eq!(
            sweep_locks(&config).await.unwrap(),
            "Removed 0 expired lock(s)"
        );
    }
}
