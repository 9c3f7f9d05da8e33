//! Domain layer for the tenancy core
//!
//! Contains tenant identity, the entities owned by the concurrency primitives
//! and the static schema of every table reachable through the tenant-aware
//! repository. This layer performs no I/O.

pub mod entities;
pub mod errors;
pub mod schema;
pub mod value_objects;

// Re-export tenant module for convenient access
pub use value_objects::tenant;

pub use entities::*;
pub use errors::DomainError;
pub use schema::{ColumnKind, FieldDef, TableSchema};
pub use value_objects::*;
