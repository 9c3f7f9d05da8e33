//! Named resource locks
//!
//! A lock serializes access to a resource shared across tenants, such as a
//! rate-limited third-party API. Valid transitions:
//!
//! ```text
//! Unlocked ──acquire──> Locked ──release / ttl expiry──> Unlocked
//! ```
//!
//! A second acquisition while `Locked` yields [`LockOutcome::AlreadyLocked`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::TenantId;

/// A held lock row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLock {
    pub id: i64,
    /// Tenant whose operation took the lock, if it ran under a bound context
    pub tenant_id: Option<TenantId>,
    pub name: String,
    pub acquired_at: DateTime<Utc>,
    /// `None` means the lock is held until explicitly released
    pub expires_at: Option<DateTime<Utc>>,
}

impl ResourceLock {
    /// Whether the lock no longer blocks acquisition at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Whether the lock is expired right now
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Result of a lock acquisition attempt
///
/// Contention is an ordinary outcome, not an error, so callers can back off
/// and retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    /// The caller now holds the lock
    Granted(ResourceLock),
    /// Another holder has an unexpired lock on the name
    AlreadyLocked,
}

impl LockOutcome {
    /// Whether the lock was granted
    pub const fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn lock(expires_at: Option<DateTime<Utc>>) -> ResourceLock {
        ResourceLock {
            id: 1,
            tenant_id: None,
            name: "sheets-api".to_string(),
            acquired_at: Utc::now(),
            expires_at,
        }
    }

    #[test]
    fn lock_without_ttl_never_expires() {
        let lock = lock(None);
        assert!(!lock.is_expired_at(Utc::now() + Duration::days(365)));
    }

    #[test]
    fn lock_expires_at_deadline() {
        let deadline = Utc::now() + Duration::seconds(30);
        let lock = lock(Some(deadline));
        assert!(!lock.is_expired_at(deadline - Duration::seconds(1)));
        assert!(lock.is_expired_at(deadline));
    }

    #[test]
    fn outcome_reports_grant() {
        assert!(LockOutcome::Granted(lock(None)).is_granted());
        assert!(!LockOutcome::AlreadyLocked.is_granted());
    }
}
