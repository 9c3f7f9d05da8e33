//! Value Objects - Immutable, identity-less domain primitives

pub mod tenant;
mod tenant_id;
mod user_id;

pub use tenant::{AuthenticatedPrincipal, ContextSummary, TenantAware, TenantContext};
pub use tenant_id::TenantId;
pub use user_id::UserId;
