//! Application layer - Use cases and orchestration
//!
//! Contains the context propagator, the schema guard, the ports implemented
//! by the infrastructure layer and the tenant-scoped services built on them.

pub mod context_propagator;
pub mod error;
pub mod ports;
pub mod services;

pub use context_propagator::ContextPropagator;
pub use error::ApplicationError;
pub use ports::*;
pub use services::*;
