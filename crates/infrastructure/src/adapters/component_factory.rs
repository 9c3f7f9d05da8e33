//! SQLite-backed construction of tenant-scoped components

use std::sync::Arc;

use application::{
    ApplicationError, CounterPort, LockPort, ReceiptIngestionService, RecognitionPort,
    RowSinkPort, SchemaGuard, SequenceService, TenantComponentFactory, TenantConfig,
    TenantRepositoryPort, TenantService, TenantServiceContainer,
};
use domain::TenantContext;
use sqlx::SqlitePool;
use tracing::debug;

use crate::config::TenancyConfig;
use crate::persistence::{SqliteCounterStore, SqliteLockManager, SqliteTenantRepository};

/// Builds repositories and services over one shared pool
///
/// Counters and locks are process-wide stores keyed by tenant; repositories
/// and services are created fresh for every tenant that asks.
#[derive(Clone)]
pub struct SqliteComponentFactory {
    pool: SqlitePool,
    guard: Arc<SchemaGuard>,
    counters: Arc<dyn CounterPort>,
    locks: Arc<dyn LockPort>,
    recognition: Option<Arc<dyn RecognitionPort>>,
    sink: Option<Arc<dyn RowSinkPort>>,
    tenancy: TenancyConfig,
}

impl std::fmt::Debug for SqliteComponentFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteComponentFactory")
            .field("recognition", &self.recognition.is_some())
            .field("sink", &self.sink.is_some())
            .field("tenancy", &self.tenancy)
            .finish_non_exhaustive()
    }
}

impl SqliteComponentFactory {
    pub fn new(pool: SqlitePool, tenancy: TenancyConfig) -> Self {
        let guard = Arc::new(SchemaGuard::new(domain::schema::TABLES, tenancy.max_page_size));
        Self {
            counters: Arc::new(SqliteCounterStore::new(pool.clone())),
            locks: Arc::new(SqliteLockManager::new(pool.clone())),
            pool,
            guard,
            recognition: None,
            sink: None,
            tenancy,
        }
    }

    /// Receipt recognition used by the ingestion service
    #[must_use]
    pub fn with_recognition(mut self, recognition: Arc<dyn RecognitionPort>) -> Self {
        self.recognition = Some(recognition);
        self
    }

    /// Export target used by the ingestion service
    #[must_use]
    pub fn with_row_sink(mut self, sink: Arc<dyn RowSinkPort>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn guard(&self) -> Arc<SchemaGuard> {
        Arc::clone(&self.guard)
    }

    pub fn counters(&self) -> Arc<dyn CounterPort> {
        Arc::clone(&self.counters)
    }

    pub fn locks(&self) -> Arc<dyn LockPort> {
        Arc::clone(&self.locks)
    }

    /// A container that builds its components with this factory
    pub fn into_container(self) -> TenantServiceContainer {
        let guard = self.guard();
        let defaults = self.tenancy.default_tenant_config();
        TenantServiceContainer::new(Arc::new(self), guard).with_default_config(defaults)
    }

    fn sequence(&self, context: &TenantContext, config: &TenantConfig) -> SequenceService {
        SequenceService::new(
            context.tenant_id().clone(),
            config.receipt_prefix.clone(),
            self.counters(),
        )
    }
}

impl TenantComponentFactory for SqliteComponentFactory {
    fn repository(
        &self,
        context: &TenantContext,
    ) -> Result<Arc<dyn TenantRepositoryPort>, ApplicationError> {
        Ok(Arc::new(SqliteTenantRepository::new(
            self.pool.clone(),
            self.guard(),
            context.clone(),
        )))
    }

    fn service(
        &self,
        kind: &str,
        context: &TenantContext,
        repository: Arc<dyn TenantRepositoryPort>,
        config: &TenantConfig,
    ) -> Result<Arc<dyn TenantService>, ApplicationError> {
        debug!(tenant_id = %context.tenant_id(), kind, "Building service");
        match kind {
            SequenceService::KIND => Ok(Arc::new(self.sequence(context, config))),
            ReceiptIngestionService::KIND => {
                let recognition = self.recognition.clone().ok_or_else(|| {
                    ApplicationError::Configuration("no recognition adapter configured".into())
                })?;
                let sink = self.sink.clone().ok_or_else(|| {
                    ApplicationError::Configuration("no export sink configured".into())
                })?;
                Ok(Arc::new(ReceiptIngestionService::new(
                    context.clone(),
                    repository,
                    Arc::new(self.sequence(context, config)),
                    recognition,
                    sink,
                    self.locks(),
                    self.tenancy.ingestion_settings(config),
                )))
            },
            other => Err(ApplicationError::Configuration(format!(
                "unknown service kind: {other}"
            ))),
        }
    }
}
