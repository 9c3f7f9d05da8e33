//! Infrastructure layer - Adapters for external systems
//!
//! Implements the application ports on SQLite (sqlx) and provides
//! configuration loading and logging setup.

pub mod adapters;
pub mod config;
pub mod persistence;
pub mod telemetry;

pub use adapters::*;
pub use config::{
    AppConfig, DatabaseConfig, Environment, LogFormat, TelemetryAppConfig, TenancyConfig,
};
pub use persistence::{
    AsyncDatabase, AsyncDatabaseConfig, AsyncDatabaseError, SqliteCounterStore,
    SqliteLockManager, SqliteTenantRepository, TenantTransaction, map_sqlx_error,
};
pub use telemetry::{TelemetryError, init_tracing};
