//! Receipt recognition port
//!
//! The OCR/LLM collaborator is treated as an opaque function from image bytes
//! to structured fields.

use async_trait::async_trait;
use domain::TenantContext;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::ApplicationError;

/// Fields extracted from a receipt image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedReceipt {
    pub merchant_name: Option<String>,
    pub total_amount: Option<f64>,
    pub currency: Option<String>,
    /// Date as printed on the receipt, normalized to `YYYY-MM-DD` when possible
    pub issued_at: Option<String>,
    /// Everything else the recognizer returned
    #[serde(default)]
    pub raw_fields: serde_json::Value,
}

/// Port for image recognition
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RecognitionPort: Send + Sync {
    /// Extract structured fields from an image
    async fn recognize(
        &self,
        context: &TenantContext,
        image: &[u8],
    ) -> Result<RecognizedReceipt, ApplicationError>;
}
