//! Tenancy limits and per-tenant defaults.

use std::time::Duration;

use application::{DEFAULT_EXPORT_LOCK, DEFAULT_MAX_LIMIT, IngestionSettings, TenantConfig};
use serde::{Deserialize, Serialize};

/// Tenancy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    /// Largest accepted `limit` on list queries
    #[serde(default = "default_max_page_size")]
    pub max_page_size: i64,

    /// TTL of the export lock, in seconds
    #[serde(default = "default_lock_ttl_secs")]
    pub default_lock_ttl_secs: u64,

    /// Name of the lock serializing access to the export sink
    #[serde(default = "default_export_lock_name")]
    pub export_lock_name: String,

    /// Receipts exported per batch
    #[serde(default = "default_export_batch_size")]
    pub export_batch_size: i64,

    /// Receipt number prefix for tenants initialized without configuration
    #[serde(default = "default_receipt_prefix")]
    pub receipt_prefix: String,

    /// Export sheet for tenants initialized without configuration
    #[serde(default = "default_export_sheet")]
    pub export_sheet: String,
}

const fn default_max_page_size() -> i64 {
    DEFAULT_MAX_LIMIT
}

const fn default_lock_ttl_secs() -> u64 {
    30
}

fn default_export_lock_name() -> String {
    DEFAULT_EXPORT_LOCK.to_string()
}

const fn default_export_batch_size() -> i64 {
    50
}

fn default_receipt_prefix() -> String {
    "RCP".to_string()
}

fn default_export_sheet() -> String {
    "Receipts".to_string()
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            max_page_size: default_max_page_size(),
            default_lock_ttl_secs: default_lock_ttl_secs(),
            export_lock_name: default_export_lock_name(),
            export_batch_size: default_export_batch_size(),
            receipt_prefix: default_receipt_prefix(),
            export_sheet: default_export_sheet(),
        }
    }
}

impl TenancyConfig {
    /// TTL applied to the export lock
    pub const fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.default_lock_ttl_secs)
    }

    /// Configuration used when a tenant is initialized implicitly
    pub fn default_tenant_config(&self) -> TenantConfig {
        TenantConfig {
            receipt_prefix: self.receipt_prefix.clone(),
            export_sheet: self.export_sheet.clone(),
            ..TenantConfig::default()
        }
    }

    /// Export behaviour for one tenant
    pub fn ingestion_settings(&self, tenant: &TenantConfig) -> IngestionSettings {
        IngestionSettings {
            export_lock: self.export_lock_name.clone(),
            lock_ttl: self.lock_ttl(),
            sheet: tenant.export_sheet.clone(),
            batch_size: self.export_batch_size.clamp(1, self.max_page_size.max(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingestion_settings_follow_tenant_sheet() {
        let config = TenancyConfig::default();
        let tenant = TenantConfig {
            export_sheet: "Belege".to_string(),
            ..TenantConfig::default()
        };
        let settings = config.ingestion_settings(&tenant);
        assert_eq!(settings.sheet, "Belege");
        assert_eq!(settings.export_lock, DEFAULT_EXPORT_LOCK);
        assert_eq!(settings.lock_ttl, Duration::from_secs(30));
    }

    #[test]
    fn batch_size_is_capped_by_page_size() {
        let config = TenancyConfig {
            max_page_size: 10,
            export_batch_size: 500,
            ..TenancyConfig::default()
        };
        assert_eq!(
            config
                .ingestion_settings(&TenantConfig::default())
                .batch_size,
            10
        );
    }
}
