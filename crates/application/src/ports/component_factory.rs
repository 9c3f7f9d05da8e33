//! Construction of tenant-scoped components
//!
//! The service container owns caching and teardown; a factory only knows how
//! to build a fresh instance for one tenant. Keeping the two apart lets tests
//! inject factories without any global state.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use domain::TenantContext;
use serde::{Deserialize, Serialize};

use super::TenantRepositoryPort;
use crate::error::ApplicationError;

/// Per-tenant settings supplied at initialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfig {
    /// Human-readable tenant name
    #[serde(default)]
    pub display_name: Option<String>,
    /// Prefix of generated receipt numbers
    #[serde(default = "default_receipt_prefix")]
    pub receipt_prefix: String,
    /// Sheet receiving exported receipts
    #[serde(default = "default_export_sheet")]
    pub export_sheet: String,
    /// Free-form settings for services
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

fn default_receipt_prefix() -> String {
    "RCP".to_string()
}

fn default_export_sheet() -> String {
    "Receipts".to_string()
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            display_name: None,
            receipt_prefix: default_receipt_prefix(),
            export_sheet: default_export_sheet(),
            settings: BTreeMap::new(),
        }
    }
}

/// A service instance owned by exactly one tenant
#[async_trait]
pub trait TenantService: Send + Sync + fmt::Debug {
    /// Kind under which the container caches this service
    fn kind(&self) -> &'static str;

    /// Release resources before the tenant is evicted
    async fn shutdown(&self) -> Result<(), ApplicationError> {
        Ok(())
    }

    /// Upcast for typed retrieval from the container
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Builds fresh tenant-scoped instances
pub trait TenantComponentFactory: Send + Sync {
    /// A repository bound to `context`
    fn repository(
        &self,
        context: &TenantContext,
    ) -> Result<Arc<dyn TenantRepositoryPort>, ApplicationError>;

    /// A service of `kind` for the tenant of `context`
    fn service(
        &self,
        kind: &str,
        context: &TenantContext,
        repository: Arc<dyn TenantRepositoryPort>,
        config: &TenantConfig,
    ) -> Result<Arc<dyn TenantService>, ApplicationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_config_defaults() {
        let config = TenantConfig::default();
        assert_eq!(config.receipt_prefix, "RCP");
        assert_eq!(config.export_sheet, "Receipts");
        assert!(config.display_name.is_none());
    }

    #[test]
    fn tenant_config_fills_missing_fields() {
        let config: TenantConfig = serde_json::from_str(r#"{"displayName":"Acme"}"#).unwrap();
        assert_eq!(config.display_name.as_deref(), Some("Acme"));
        assert_eq!(config.receipt_prefix, "RCP");
    }

    #[test]
    fn traits_are_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn TenantService>();
        assert_send_sync::<dyn TenantComponentFactory>();
    }
}
