//! Infrastructure adapters
//!
//! Adapters connect application ports to concrete implementations.

mod component_factory;

pub use component_factory::SqliteComponentFactory;
