//! Implicit propagation of the active tenant context
//!
//! Repositories and services receive their [`TenantContext`] explicitly when
//! they are constructed. Code that cannot take the context as a parameter
//! (logging helpers, the lock store stamping a holder, deeply nested callbacks)
//! reads it from the task-local binding established by
//! [`ContextPropagator::run`].
//!
//! The binding is a tokio task-local: it follows the future across every
//! `.await`, is restored when the scope ends (normally or with an error), and
//! is never visible to sibling tasks. A detached task spawned with
//! `tokio::spawn` starts unbound; use [`ContextPropagator::spawn_bound`] to
//! re-bind it explicitly.
//!
//! # Examples
//!
//! ```
//! use std::collections::BTreeMap;
//! use application::ContextPropagator;
//! use domain::TenantContext;
//!
//! let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! rt.block_on(async {
//!     let ctx = TenantContext::create("t1", "alice", ["read"], BTreeMap::new()).unwrap();
//!
//!     assert!(ContextPropagator::current().is_none());
//!     let seen = ContextPropagator::run(ctx, async {
//!         ContextPropagator::current().map(|c| c.tenant_id().to_string())
//!     })
//!     .await;
//!
//!     assert_eq!(seen.as_deref(), Some("t1"));
//!     assert!(ContextPropagator::current().is_none());
//! });
//! ```

use std::future::Future;

use domain::TenantContext;
use tokio::task::JoinHandle;
use tracing::{Instrument, info_span};

use crate::error::ApplicationError;

tokio::task_local! {
    static CURRENT_CONTEXT: TenantContext;
}

/// Binds a [`TenantContext`] for the dynamic extent of one operation
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextPropagator;

impl ContextPropagator {
    /// Run `operation` with `context` bound as current
    ///
    /// The binding is unwound when the future completes, whatever its output.
    /// Nested calls shadow the outer binding and restore it on exit.
    pub async fn run<F>(context: TenantContext, operation: F) -> F::Output
    where
        F: Future,
    {
        let span = info_span!(
            "tenant_operation",
            tenant_id = %context.tenant_id(),
            user_id = %context.user_id()
        );
        CURRENT_CONTEXT
            .scope(context, operation)
            .instrument(span)
            .await
    }

    /// Synchronous counterpart of [`run`](Self::run)
    pub fn run_sync<R>(context: TenantContext, operation: impl FnOnce() -> R) -> R {
        CURRENT_CONTEXT.sync_scope(context, operation)
    }

    /// The context bound by the nearest enclosing `run`, if any
    pub fn current() -> Option<TenantContext> {
        CURRENT_CONTEXT.try_with(Clone::clone).ok()
    }

    /// Borrow the current context without cloning it
    pub fn with_current<R>(f: impl FnOnce(&TenantContext) -> R) -> Option<R> {
        CURRENT_CONTEXT.try_with(f).ok()
    }

    /// The current context, or [`ApplicationError::MissingContext`]
    pub fn require() -> Result<TenantContext, ApplicationError> {
        Self::current().ok_or(ApplicationError::MissingContext)
    }

    /// Spawn a detached task that runs under `context`
    ///
    /// `tokio::spawn` does not carry task-locals across the scheduling
    /// boundary, so background work must state its context here.
    pub fn spawn_bound<F>(context: TenantContext, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::spawn(Self::run(context, task))
    }
}
