//! Application services - Use case implementations

mod entity_repository;
mod receipt_ingestion_service;
pub mod schema_guard;
mod sequence_service;
mod tenant_container;

pub use entity_repository::EntityRepository;
pub use receipt_ingestion_service::{
    DEFAULT_EXPORT_LOCK, IngestionOutcome, IngestionSettings, ReceiptIngestionService,
};
pub use schema_guard::{DEFAULT_MAX_LIMIT, OrderTerm, SchemaGuard, SortDirection, TableRules};
pub use sequence_service::{RECEIPT_SEQUENCE, SequenceService};
pub use tenant_container::TenantServiceContainer;
