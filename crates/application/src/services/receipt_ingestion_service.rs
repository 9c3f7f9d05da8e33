//! Receipt ingestion workflow
//!
//! Recognize an image, number and store the receipt for the tenant, then try
//! to export it through the shared spreadsheet sink. The sink is rate limited
//! across all tenants, so exports are serialized by a named resource lock.
//! When the lock is busy the receipt is parked as `pending_export` and picked
//! up later by [`ReceiptIngestionService::export_pending`].

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::{LockOutcome, ReceiptStatus, Record, ResourceLock, TenantContext, UserId, schema};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::entity_repository::EntityRepository;
use super::sequence_service::SequenceService;
use crate::error::ApplicationError;
use crate::ports::{
    LockPort, QueryOptions, RecognitionPort, RowSinkPort, SinkRow, TenantRepositoryPort,
    TenantService,
};

/// Default lock guarding the export sink
pub const DEFAULT_EXPORT_LOCK: &str = "export-sink";

/// Export behaviour of the ingestion service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionSettings {
    /// Name of the resource lock shared by all tenants
    pub export_lock: String,
    /// How long a crashed exporter can block others
    pub lock_ttl: Duration,
    /// Target sheet
    pub sheet: String,
    /// Receipts exported per `export_pending` call
    pub batch_size: i64,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            export_lock: DEFAULT_EXPORT_LOCK.to_string(),
            lock_ttl: Duration::from_secs(30),
            sheet: "Receipts".to_string(),
            batch_size: 50,
        }
    }
}

/// Result of ingesting one receipt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionOutcome {
    pub receipt_id: i64,
    pub receipt_number: String,
    pub status: ReceiptStatus,
}

/// Per-tenant receipt ingestion
pub struct ReceiptIngestionService {
    context: TenantContext,
    receipts: EntityRepository,
    sequence: Arc<SequenceService>,
    recognition: Arc<dyn RecognitionPort>,
    sink: Arc<dyn RowSinkPort>,
    locks: Arc<dyn LockPort>,
    settings: IngestionSettings,
}

impl std::fmt::Debug for ReceiptIngestionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiptIngestionService")
            .field("tenant_id", self.context.tenant_id())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ReceiptIngestionService {
    /// Container kind
    pub const KIND: &'static str = "receipt_ingestion";

    pub fn new(
        context: TenantContext,
        repository: Arc<dyn TenantRepositoryPort>,
        sequence: Arc<SequenceService>,
        recognition: Arc<dyn RecognitionPort>,
        sink: Arc<dyn RowSinkPort>,
        locks: Arc<dyn LockPort>,
        settings: IngestionSettings,
    ) -> Self {
        Self {
            context,
            receipts: EntityRepository::new(repository, &schema::RECEIPTS),
            sequence,
            recognition,
            sink,
            locks,
            settings,
        }
    }

    pub const fn settings(&self) -> &IngestionSettings {
        &self.settings
    }

    /// Recognize, store and try to export one receipt image
    #[instrument(skip(self, image), fields(tenant_id = %self.context.tenant_id(), bytes = image.len()))]
    pub async fn ingest(
        &self,
        image: &[u8],
        user_id: &UserId,
    ) -> Result<IngestionOutcome, ApplicationError> {
        let recognized = self.recognition.recognize(&self.context, image).await?;
        let receipt_number = self.sequence.next_receipt_number().await?;

        let mut data = Record::new();
        data.insert("userId".to_string(), Value::from(user_id.as_str()));
        data.insert("receiptNumber".to_string(), Value::from(receipt_number.as_str()));
        data.insert("merchantName".to_string(), recognized.merchant_name.into());
        data.insert("totalAmount".to_string(), recognized.total_amount.into());
        data.insert("currency".to_string(), recognized.currency.into());
        data.insert("issuedAt".to_string(), recognized.issued_at.into());
        data.insert("rawFields".to_string(), recognized.raw_fields);
        data.insert(
            "status".to_string(),
            Value::from(ReceiptStatus::Recognized.as_str()),
        );

        let stored = self.receipts.create(data).await?;
        let receipt_id = record_id(&stored)?;

        let status = match self
            .locks
            .acquire(&self.settings.export_lock, Some(self.settings.lock_ttl))
            .await?
        {
            LockOutcome::AlreadyLocked => {
                self.mark(receipt_id, ReceiptStatus::PendingExport).await?;
                info!(%receipt_number, "Export sink busy, receipt queued");
                ReceiptStatus::PendingExport
            },
            LockOutcome::Granted(lock) => {
                let exported = self.export_one(receipt_id, &stored).await;
                self.release_export_lock(&lock).await;
                exported?;
                ReceiptStatus::Exported
            },
        };

        Ok(IngestionOutcome {
            receipt_id,
            receipt_number,
            status,
        })
    }

    /// Export queued receipts while holding the sink lock
    ///
    /// Returns how many receipts were exported; zero when another exporter
    /// holds the lock.
    #[instrument(skip(self), fields(tenant_id = %self.context.tenant_id()))]
    pub async fn export_pending(&self) -> Result<usize, ApplicationError> {
        let LockOutcome::Granted(lock) = self
            .locks
            .acquire(&self.settings.export_lock, Some(self.settings.lock_ttl))
            .await?
        else {
            debug!("Export sink busy");
            return Ok(0);
        };

        let exported = self.export_batch().await;
        self.release_export_lock(&lock).await;
        exported
    }

    async fn export_batch(&self) -> Result<usize, ApplicationError> {
        let mut conditions = Record::new();
        conditions.insert(
            "status".to_string(),
            Value::from(ReceiptStatus::PendingExport.as_str()),
        );
        let options = QueryOptions::new()
            .order_by("id ASC")
            .limit(self.settings.batch_size);

        let pending = self.receipts.find_many(conditions, &options).await?;
        let mut exported = 0;
        for receipt in &pending {
            self.export_one(record_id(receipt)?, receipt).await?;
            exported += 1;
        }
        if exported > 0 {
            info!(exported, "Exported queued receipts");
        }
        Ok(exported)
    }

    async fn export_one(&self, receipt_id: i64, receipt: &Record) -> Result<(), ApplicationError> {
        let row = self.sink_row(receipt);
        match self.sink.append_row(&self.context, &row).await {
            Ok(()) => self.mark(receipt_id, ReceiptStatus::Exported).await,
            Err(e) => {
                if let Err(mark_err) = self.mark(receipt_id, ReceiptStatus::ExportFailed).await {
                    warn!(receipt_id, error = %mark_err, "Failed to record export failure");
                }
                Err(match e {
                    ApplicationError::ExternalService(_) => e,
                    other => ApplicationError::ExternalService(other.to_string()),
                })
            },
        }
    }

    fn sink_row(&self, receipt: &Record) -> SinkRow {
        let field = |name: &str| receipt.get(name).cloned().unwrap_or(Value::Null);
        let row_key = receipt
            .get("receiptNumber")
            .and_then(Value::as_str)
            .map_or_else(|| field("id").to_string(), str::to_string);

        SinkRow {
            sheet: self.settings.sheet.clone(),
            row_key,
            values: vec![
                field("receiptNumber"),
                field("issuedAt"),
                field("merchantName"),
                field("totalAmount"),
                field("currency"),
                field("userId"),
            ],
        }
    }

    async fn mark(&self, receipt_id: i64, status: ReceiptStatus) -> Result<(), ApplicationError> {
        let mut data = Record::new();
        data.insert("status".to_string(), Value::from(status.as_str()));
        let result = self.receipts.update_by_id(receipt_id, data).await?;
        if result.is_empty() {
            return Err(ApplicationError::NotFound(format!("receipt {receipt_id}")));
        }
        Ok(())
    }

    /// Release the export lock unless it expired and changed hands
    async fn release_export_lock(&self, lock: &ResourceLock) {
        match self.locks.release_held(lock).await {
            Ok(true) => {},
            Ok(false) => {
                warn!(lock = %lock.name, "Export outlived the lock ttl; lock already taken over");
            },
            Err(e) => {
                warn!(lock = %lock.name, error = %e, "Failed to release export lock");
            },
        }
    }
}

fn record_id(record: &Record) -> Result<i64, ApplicationError> {
    record
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| ApplicationError::Internal("stored receipt has no id".to_string()))
}

#[async_trait]
impl TenantService for ReceiptIngestionService {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use domain::{TenantId, WriteResult};
    use serde_json::json;

    use super::*;
    use crate::ports::{
        MockCounterPort, MockLockPort, MockRecognitionPort, MockRowSinkPort,
        MockTenantRepositoryPort, RecognizedReceipt,
    };

    fn context() -> TenantContext {
        TenantContext::new(TenantId::parse("t1").unwrap(), UserId::system())
    }

    fn granted(name: &str) -> LockOutcome {
        LockOutcome::Granted(ResourceLock {
            id: 1,
            tenant_id: None,
            name: name.to_string(),
            acquired_at: Utc::now(),
            expires_at: None,
        })
    }

    fn recognition() -> MockRecognitionPort {
        let mut mock = MockRecognitionPort::new();
        mock.expect_recognize().returning(|_, _| {
            Ok(RecognizedReceipt {
                merchant_name: Some("Bakery".to_string()),
                total_amount: Some(4.5),
                currency: Some("EUR".to_string()),
                issued_at: Some("2026-10-01".to_string()),
                raw_fields: json!({}),
            })
        });
        mock
    }

    fn counters() -> Arc<SequenceService> {
        let mut counters = MockCounterPort::new();
        counters.expect_increment().returning(|_, _| Ok(42));
        Arc::new(SequenceService::new(
            TenantId::parse("t1").unwrap(),
            "RCP",
            Arc::new(counters),
        ))
    }

    fn repository_expecting(status: &'static str) -> MockTenantRepositoryPort {
        let mut repo = MockTenantRepositoryPort::new();
        repo.expect_create()
            .withf(|table, data| {
                table == "receipts"
                    && data.get("status") == Some(&json!("recognized"))
                    && data.get("receiptNumber") == Some(&json!("RCP-000042"))
            })
            .times(1)
            .returning(|_, data| {
                let mut stored = data;
                stored.insert("id".to_string(), json!(7));
                Ok(stored)
            });
        repo.expect_update()
            .withf(move |table, conditions, data| {
                table == "receipts"
                    && conditions.get("id") == Some(&json!(7))
                    && data.get("status") == Some(&json!(status))
            })
            .times(1)
            .returning(|_, _, _| Ok(WriteResult::new(1)));
        repo
    }

    fn service(
        repo: MockTenantRepositoryPort,
        sink: MockRowSinkPort,
        locks: MockLockPort,
    ) -> ReceiptIngestionService {
        ReceiptIngestionService::new(
            context(),
            Arc::new(repo),
            counters(),
            Arc::new(recognition()),
            Arc::new(sink),
            Arc::new(locks),
            IngestionSettings::default(),
        )
    }

    #[tokio::test]
    async fn exports_when_lock_is_granted() {
        let mut locks = MockLockPort::new();
        locks
            .expect_acquire()
            .withf(|name, ttl| name == DEFAULT_EXPORT_LOCK && ttl.is_some())
            .times(1)
            .returning(|name, _| Ok(granted(name)));
        locks.expect_release_held().times(1).returning(|_| Ok(true));

        let mut sink = MockRowSinkPort::new();
        sink.expect_append_row()
            .withf(|_, row| row.row_key == "RCP-000042" && row.sheet == "Receipts")
            .times(1)
            .returning(|_, _| Ok(()));

        let service = service(repository_expecting("exported"), sink, locks);
        let outcome = service.ingest(b"jpeg", &UserId::parse("u1").unwrap()).await.unwrap();

        assert_eq!(outcome.receipt_id, 7);
        assert_eq!(outcome.receipt_number, "RCP-000042");
        assert_eq!(outcome.status, ReceiptStatus::Exported);
    }

    #[tokio::test]
    async fn release_goes_through_the_granted_holding() {
        let mut locks = MockLockPort::new();
        locks.expect_acquire().returning(|name, _| Ok(granted(name)));
        locks
            .expect_release_held()
            .withf(|lock| lock.id == 1 && lock.name == DEFAULT_EXPORT_LOCK)
            .times(1)
            .returning(|_| Ok(false));
        locks.expect_release().never();

        let mut sink = MockRowSinkPort::new();
        sink.expect_append_row().times(1).returning(|_, _| Ok(()));

        let service = service(repository_expecting("exported"), sink, locks);
        let outcome = service.ingest(b"jpeg", &UserId::parse("u1").unwrap()).await.unwrap();

        assert_eq!(outcome.status, ReceiptStatus::Exported);
    }

    #[tokio::test]
    async fn queues_when_lock_is_busy() {
        let mut locks = MockLockPort::new();
        locks
            .expect_acquire()
            .returning(|_, _| Ok(LockOutcome::AlreadyLocked));
        locks.expect_release_held().never();

        let mut sink = MockRowSinkPort::new();
        sink.expect_append_row().never();

        let service = service(repository_expecting("pending_export"), sink, locks);
        let outcome = service.ingest(b"jpeg", &UserId::parse("u1").unwrap()).await.unwrap();

        assert_eq!(outcome.status, ReceiptStatus::PendingExport);
    }

    #[tokio::test]
    async fn sink_failure_marks_receipt_and_releases_lock() {
        let mut locks = MockLockPort::new();
        locks.expect_acquire().returning(|name, _| Ok(granted(name)));
        locks.expect_release_held().times(1).returning(|_| Ok(true));

        let mut sink = MockRowSinkPort::new();
        sink.expect_append_row()
            .returning(|_, _| Err(ApplicationError::Internal("quota".to_string())));

        let service = service(repository_expecting("export_failed"), sink, locks);
        let result = service.ingest(b"jpeg", &UserId::parse("u1").unwrap()).await;

        assert!(matches!(result, Err(ApplicationError::ExternalService(_))));
    }

    #[tokio::test]
    async fn export_pending_skips_when_busy() {
        let mut locks = MockLockPort::new();
        locks
            .expect_acquire()
            .returning(|_, _| Ok(LockOutcome::AlreadyLocked));
        locks.expect_release_held().never();

        let service = ReceiptIngestionService::new(
            context(),
            Arc::new(MockTenantRepositoryPort::new()),
            counters(),
            Arc::new(MockRecognitionPort::new()),
            Arc::new(MockRowSinkPort::new()),
            Arc::new(locks),
            IngestionSettings::default(),
        );
        assert_eq!(service.export_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn export_pending_exports_queued_receipts() {
        let mut locks = MockLockPort::new();
        locks.expect_acquire().returning(|name, _| Ok(granted(name)));
        locks.expect_release_held().times(1).returning(|_| Ok(true));

        let mut repo = MockTenantRepositoryPort::new();
        repo.expect_find_many()
            .withf(|table, conditions, options| {
                table == "receipts"
                    && conditions.get("status") == Some(&json!("pending_export"))
                    && options.limit == Some(50)
            })
            .returning(|_, _, _| {
                Ok(vec![
                    json!({ "id": 1, "receiptNumber": "RCP-000001" }),
                    json!({ "id": 2, "receiptNumber": "RCP-000002" }),
                ]
                .into_iter()
                .filter_map(|v| v.as_object().cloned())
                .collect())
            });
        repo.expect_update()
            .withf(|_, _, data| data.get("status") == Some(&json!("exported")))
            .times(2)
            .returning(|_, _, _| Ok(WriteResult::new(1)));

        let mut sink = MockRowSinkPort::new();
        sink.expect_append_row().times(2).returning(|_, _| Ok(()));

        let service = ReceiptIngestionService::new(
            context(),
            Arc::new(repo),
            counters(),
            Arc::new(MockRecognitionPort::new()),
            Arc::new(sink),
            Arc::new(locks),
            IngestionSettings::default(),
        );
        assert_eq!(service.export_pending().await.unwrap(), 2);
    }
}
