//! Async database connection using sqlx
//!
//! One pool is shared by every tenant. Connection-level settings (WAL,
//! busy timeout, foreign keys) are applied through the connect options so
//! every pooled connection carries them, not just the first one.
//! Migrations are managed via sqlx's `migrate!()` macro using SQL
//! files in the workspace `migrations/` directory.

use std::{path::Path, str::FromStr, time::Duration};

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};
use tracing::{debug, info, instrument};

/// Failure opening, migrating or configuring the shared pool
#[derive(Debug, thiserror::Error)]
pub enum AsyncDatabaseError {
    #[error("SQLite pool failure: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Tenant schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid pool settings: {0}")]
    Config(String),
}

/// Pool settings shared by every tenant-bound component
#[derive(Debug, Clone)]
pub struct AsyncDatabaseConfig {
    /// `sqlite:<path>` or `sqlite::memory:`
    pub url: String,
    /// Upper bound on pooled connections
    pub max_connections: u32,
    /// Connections opened eagerly and kept warm
    pub min_connections: u32,
    /// Journal in WAL mode (ignored for in-memory databases)
    pub wal_mode: bool,
    /// Enforce `FOREIGN KEY` constraints on every connection
    pub foreign_keys: bool,
    /// How long a writer waits for a competing writer before failing
    pub busy_timeout: Duration,
}

impl Default for AsyncDatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:tenancy.db".to_string(),
            max_connections: 5,
            min_connections: 1,
            wal_mode: true,
            foreign_keys: true,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl AsyncDatabaseConfig {
    /// Single-connection in-memory pool
    ///
    /// SQLite gives each `:memory:` connection its own database, so the pool
    /// is pinned to one connection.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            wal_mode: false,
            ..Self::default()
        }
    }

    /// Pool over the SQLite file at `path`, created on first connect
    #[must_use]
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            url: format!("sqlite:{}", path.as_ref().display()),
            ..Self::default()
        }
    }

    fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:")
    }
}

/// Async database connection pool
#[derive(Debug, Clone)]
pub struct AsyncDatabase {
    pool: SqlitePool,
}

impl AsyncDatabase {
    /// Open the shared pool with per-connection pragmas applied
    #[instrument(skip_all, fields(url = %config.url))]
    pub async fn new(config: &AsyncDatabaseConfig) -> Result<Self, AsyncDatabaseError> {
        if config.max_connections == 0 {
            return Err(AsyncDatabaseError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }

        let mut options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(config.foreign_keys)
            .busy_timeout(config.busy_timeout);

        if config.wal_mode && !config.is_in_memory() {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
            debug!("WAL mode enabled");
        }

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections.min(config.max_connections));

        if config.is_in_memory() {
            // Recycling the only connection would drop the database
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;

        info!(
            max_connections = config.max_connections,
            in_memory = config.is_in_memory(),
            "Tenant database pool opened"
        );

        Ok(Self { pool })
    }

    /// Open a throwaway in-memory pool
    pub async fn in_memory() -> Result<Self, AsyncDatabaseError> {
        Self::new(&AsyncDatabaseConfig::in_memory()).await
    }

    /// Pool handle shared by repositories, counters and locks
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply the tenant table and concurrency primitive migrations
    #[instrument(skip(self))]
    pub async fn migrate(&self) -> Result<(), AsyncDatabaseError> {
        let migrator = sqlx::migrate!("../../migrations");
        migrator.run(&self.pool).await?;

        info!("Tenant schema up to date");
        Ok(())
    }

    /// Drain and close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
        debug!("Tenant database pool closed");
    }
}
