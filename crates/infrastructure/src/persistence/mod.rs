//! Persistence module
//!
//! sqlx-backed SQLite storage: the connection pool, tenant-isolated
//! repositories and transactions, and the counter and lock tables shared by
//! every tenant.

pub mod async_connection;
pub mod counter_store;
pub mod error;
pub mod lock_store;
pub mod query_builder;
pub mod row_codec;
pub mod tenant_repository;

pub use async_connection::{AsyncDatabase, AsyncDatabaseConfig, AsyncDatabaseError};
pub use counter_store::SqliteCounterStore;
pub use error::map_sqlx_error;
pub use lock_store::SqliteLockManager;
pub use tenant_repository::{SqliteTenantRepository, TenantTransaction};
