//! Spreadsheet export port

use async_trait::async_trait;
use domain::TenantContext;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::ApplicationError;

/// One row to append to a tenant's export target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkRow {
    /// Sheet (tab) name within the tenant's spreadsheet
    pub sheet: String,
    /// Idempotency key; appending the same key twice writes one row
    pub row_key: String,
    pub values: Vec<serde_json::Value>,
}

/// Port for the idempotent "append row" sink
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RowSinkPort: Send + Sync {
    /// Append a row, or do nothing if `row.row_key` was already written
    async fn append_row(&self, context: &TenantContext, row: &SinkRow)
    -> Result<(), ApplicationError>;
}
