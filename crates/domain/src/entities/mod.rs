//! Entities - Domain objects with identity

mod counter;
mod receipt;
mod record;
mod resource_lock;

pub use counter::Counter;
pub use receipt::ReceiptStatus;
pub use record::{Record, WriteResult};
pub use resource_lock::{LockOutcome, ResourceLock};
