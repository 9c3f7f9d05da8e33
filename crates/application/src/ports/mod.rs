//! Port definitions for application layer
//!
//! Ports are interfaces that define how the application interacts with
//! storage and external collaborators. Adapters in the infrastructure layer
//! implement these ports.

mod component_factory;
mod counter_port;
mod lock_port;
mod recognition_port;
mod row_sink_port;
mod tenant_repository;

pub use component_factory::{TenantComponentFactory, TenantConfig, TenantService};
#[cfg(test)]
pub use counter_port::MockCounterPort;
pub use counter_port::CounterPort;
#[cfg(test)]
pub use lock_port::MockLockPort;
pub use lock_port::LockPort;
#[cfg(test)]
pub use recognition_port::MockRecognitionPort;
pub use recognition_port::{RecognitionPort, RecognizedReceipt};
#[cfg(test)]
pub use row_sink_port::MockRowSinkPort;
pub use row_sink_port::{RowSinkPort, SinkRow};
#[cfg(test)]
pub use tenant_repository::MockTenantRepositoryPort;
pub use tenant_repository::{QueryOptions, TenantRepositoryPort};
