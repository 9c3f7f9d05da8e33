//! Human-readable document numbers
//!
//! Numbers are drawn from a per-tenant counter, so two concurrent requests can
//! never receive the same number and tenants never share a sequence.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use domain::TenantId;
use tracing::{debug, instrument};

use crate::error::ApplicationError;
use crate::ports::{CounterPort, TenantService};

/// Zero-padded width of the numeric part
const NUMBER_WIDTH: usize = 6;

/// Counter sequence backing receipt numbers
pub const RECEIPT_SEQUENCE: &str = "receipt";

/// Allocates numbers such as `RCP-000042`
pub struct SequenceService {
    tenant_id: TenantId,
    prefix: String,
    counters: Arc<dyn CounterPort>,
}

impl std::fmt::Debug for SequenceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceService")
            .field("tenant_id", &self.tenant_id)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl SequenceService {
    /// Container kind
    pub const KIND: &'static str = "sequence";

    pub fn new(tenant_id: TenantId, prefix: impl Into<String>, counters: Arc<dyn CounterPort>) -> Self {
        Self {
            tenant_id,
            prefix: prefix.into(),
            counters,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Next number of the named sequence
    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    pub async fn next_number(&self, sequence: &str) -> Result<String, ApplicationError> {
        let counter = format!("seq:{sequence}");
        let value = self.counters.increment(&self.tenant_id, &counter).await?;
        let number = format_number(&self.prefix, value);
        debug!(%number, "Allocated document number");
        Ok(number)
    }

    /// Next receipt number
    pub async fn next_receipt_number(&self) -> Result<String, ApplicationError> {
        self.next_number(RECEIPT_SEQUENCE).await
    }
}

fn format_number(prefix: &str, value: i64) -> String {
    format!("{prefix}-{value:0width$}", width = NUMBER_WIDTH)
}

#[async_trait]
impl TenantService for SequenceService {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
