//! Named resource lock port

use std::time::Duration;

use async_trait::async_trait;
use domain::{LockOutcome, ResourceLock};
#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Port for cross-tenant mutual exclusion on named resources
///
/// At most one unexpired lock exists per name. Acquisition is a single atomic
/// "insert unless an unexpired row exists"; among concurrent callers exactly
/// one observes [`LockOutcome::Granted`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LockPort: Send + Sync {
    /// Try to take the lock; `ttl = None` holds it until released
    async fn acquire(
        &self,
        name: &str,
        ttl: Option<Duration>,
    ) -> Result<LockOutcome, ApplicationError>;

    /// Release the lock whoever holds it; returns whether a row was removed
    async fn release(&self, name: &str) -> Result<bool, ApplicationError>;

    /// Release `lock` only if it is still the current holding
    ///
    /// Returns `false` when the lock expired and was taken over, leaving the
    /// new holder untouched.
    async fn release_held(&self, lock: &ResourceLock) -> Result<bool, ApplicationError>;

    /// Whether an unexpired lock exists for `name`
    async fn is_locked(&self, name: &str) -> Result<bool, ApplicationError>;

    /// The unexpired lock for `name`, if any
    async fn holder(&self, name: &str) -> Result<Option<ResourceLock>, ApplicationError>;

    /// Delete expired lock rows; returns how many were removed
    async fn sweep_expired(&self) -> Result<u64, ApplicationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_object_safe(_: &dyn LockPort) {}

    #[test]
    fn trait_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn LockPort>();
    }
}
