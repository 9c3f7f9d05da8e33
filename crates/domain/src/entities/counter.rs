//! Tenant-scoped counter entity

use serde::{Deserialize, Serialize};

use crate::{TenantId, tenant::TenantAware};

/// A named, monotonically updated counter owned by one tenant
///
/// `value` only changes through the atomic increment of the counter store;
/// there is deliberately no setter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub id: i64,
    pub tenant_id: TenantId,
    pub name: String,
    pub value: i64,
}

impl TenantAware for Counter {
    fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_belongs_to_its_tenant() {
        let tenant = TenantId::parse("t1").unwrap();
        let counter = Counter {
            id: 1,
            tenant_id: tenant.clone(),
            name: "receipts".to_string(),
            value: 7,
        };
        assert!(counter.belongs_to(&tenant));
        assert!(!counter.belongs_to(&TenantId::parse("t2").unwrap()));
    }
}
