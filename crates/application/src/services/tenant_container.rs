//! Registry of tenant-scoped components
//!
//! The container is the only place tenant-scoped repositories and services
//! are constructed. Instances are built lazily through the injected
//! [`TenantComponentFactory`], cached per `(tenant, kind)` and never shared
//! between tenants. The container is an ordinary value: create one per
//! process (or per test) and pass it where it is needed.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use domain::{TenantContext, TenantId};
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use super::entity_repository::EntityRepository;
use super::schema_guard::SchemaGuard;
use crate::error::ApplicationError;
use crate::ports::{TenantComponentFactory, TenantConfig, TenantRepositoryPort, TenantService};

/// Cached components of one tenant
struct TenantEntry {
    context: TenantContext,
    config: TenantConfig,
    repository: Arc<dyn TenantRepositoryPort>,
    repositories: HashMap<String, Arc<EntityRepository>>,
    services: HashMap<String, Arc<dyn TenantService>>,
}

/// Owned, injectable registry of per-tenant components
pub struct TenantServiceContainer {
    factory: Arc<dyn TenantComponentFactory>,
    guard: Arc<SchemaGuard>,
    default_config: TenantConfig,
    tenants: RwLock<HashMap<TenantId, TenantEntry>>,
}

impl std::fmt::Debug for TenantServiceContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantServiceContainer")
            .field("tenants", &self.tenants.read().len())
            .finish_non_exhaustive()
    }
}

impl TenantServiceContainer {
    pub fn new(factory: Arc<dyn TenantComponentFactory>, guard: Arc<SchemaGuard>) -> Self {
        Self {
            factory,
            guard,
            default_config: TenantConfig::default(),
            tenants: RwLock::new(HashMap::new()),
        }
    }

    /// Configuration applied when a tenant is initialized on first use
    #[must_use]
    pub fn with_default_config(mut self, config: TenantConfig) -> Self {
        self.default_config = config;
        self
    }

    /// Register a tenant
    ///
    /// Returns `false` when the tenant was already initialized; the existing
    /// entry and its configuration are left untouched.
    #[instrument(skip(self, config), fields(tenant_id = %tenant_id))]
    pub fn initialize_tenant(
        &self,
        tenant_id: &TenantId,
        config: TenantConfig,
    ) -> Result<bool, ApplicationError> {
        if self.tenants.read().contains_key(tenant_id) {
            debug!("Tenant already initialized");
            return Ok(false);
        }

        let context = TenantContext::service(tenant_id.clone());
        let repository = self.factory.repository(&context)?;

        let mut tenants = self.tenants.write();
        if tenants.contains_key(tenant_id) {
            debug!("Tenant initialized concurrently");
            return Ok(false);
        }
        tenants.insert(
            tenant_id.clone(),
            TenantEntry {
                context,
                config,
                repository,
                repositories: HashMap::new(),
                services: HashMap::new(),
            },
        );
        drop(tenants);

        info!("Tenant initialized");
        Ok(true)
    }

    /// Whether the tenant has been initialized
    pub fn is_initialized(&self, tenant_id: &TenantId) -> bool {
        self.tenants.read().contains_key(tenant_id)
    }

    /// Initialized tenants, sorted
    pub fn tenants(&self) -> Vec<TenantId> {
        let mut tenants: Vec<_> = self.tenants.read().keys().cloned().collect();
        tenants.sort();
        tenants
    }

    /// Repository for an entity kind such as `"user"`
    ///
    /// Initializes the tenant with the default configuration on first use.
    pub fn get_repository(
        &self,
        tenant_id: &TenantId,
        kind: &str,
    ) -> Result<Arc<EntityRepository>, ApplicationError> {
        let schema = self.guard.resolve_entity(kind)?.schema();
        self.ensure_initialized(tenant_id)?;

        let mut tenants = self.tenants.write();
        let entry = tenants
            .get_mut(tenant_id)
            .ok_or_else(|| tenant_not_found(tenant_id))?;
        let base = Arc::clone(&entry.repository);
        let repository = entry
            .repositories
            .entry(kind.to_string())
            .or_insert_with(|| {
                debug!(tenant_id = %tenant_id, kind, "Creating repository");
                Arc::new(EntityRepository::new(base, schema))
            });
        Ok(Arc::clone(repository))
    }

    /// Service of the given kind
    ///
    /// Initializes the tenant with default configuration on first use.
    pub fn get_service(
        &self,
        tenant_id: &TenantId,
        kind: &str,
    ) -> Result<Arc<dyn TenantService>, ApplicationError> {
        self.ensure_initialized(tenant_id)?;

        let (context, config, repository) = {
            let tenants = self.tenants.read();
            let entry = tenants
                .get(tenant_id)
                .ok_or_else(|| tenant_not_found(tenant_id))?;
            if let Some(service) = entry.services.get(kind) {
                return Ok(Arc::clone(service));
            }
            (
                entry.context.clone(),
                entry.config.clone(),
                Arc::clone(&entry.repository),
            )
        };

        let built = self.factory.service(kind, &context, repository, &config)?;

        let mut tenants = self.tenants.write();
        let entry = tenants
            .get_mut(tenant_id)
            .ok_or_else(|| tenant_not_found(tenant_id))?;
        let service = entry.services.entry(kind.to_string()).or_insert_with(|| {
            debug!(tenant_id = %tenant_id, kind, "Created service");
            built
        });
        Ok(Arc::clone(service))
    }

    /// Service of the given kind, downcast to its concrete type
    pub fn get_service_as<T>(&self, tenant_id: &TenantId, kind: &str) -> Result<Arc<T>, ApplicationError>
    where
        T: Any + Send + Sync,
    {
        self.get_service(tenant_id, kind)?
            .into_any()
            .downcast::<T>()
            .map_err(|_| {
                ApplicationError::Internal(format!(
                    "service {kind} is not a {}",
                    std::any::type_name::<T>()
                ))
            })
    }

    /// Shut down every cached service of the tenant and evict it
    ///
    /// A failing shutdown hook is logged and does not stop the others.
    /// Returns `false` when the tenant was not initialized.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn cleanup_tenant(&self, tenant_id: &TenantId) -> bool {
        let Some(entry) = self.tenants.write().remove(tenant_id) else {
            debug!("Tenant not initialized, nothing to clean up");
            return false;
        };

        for (kind, service) in entry.services {
            if let Err(e) = service.shutdown().await {
                warn!(kind = %kind, error = %e, "Service shutdown failed");
            }
        }

        info!("Tenant cleaned up");
        true
    }

    /// Diagnostic: whether two tenants share no cached component
    ///
    /// Always `false` for the same tenant or when either tenant is not
    /// initialized.
    pub fn validate_isolation(&self, a: &TenantId, b: &TenantId) -> bool {
        if a == b {
            return false;
        }
        let tenants = self.tenants.read();
        let (Some(left), Some(right)) = (tenants.get(a), tenants.get(b)) else {
            return false;
        };

        if Arc::ptr_eq(&left.repository, &right.repository) {
            return false;
        }
        let shared_repository = left.repositories.iter().any(|(kind, repo)| {
            right
                .repositories
                .get(kind)
                .is_some_and(|other| Arc::ptr_eq(repo, other))
        });
        let shared_service = left.services.values().any(|service| {
            right
                .services
                .values()
                .any(|other| Arc::ptr_eq(service, other))
        });
        !shared_repository && !shared_service
    }

    fn ensure_initialized(&self, tenant_id: &TenantId) -> Result<(), ApplicationError> {
        if !self.is_initialized(tenant_id) {
            self.initialize_tenant(tenant_id, self.default_config.clone())?;
        }
        Ok(())
    }
}

fn tenant_not_found(tenant_id: &TenantId) -> ApplicationError {
    ApplicationError::NotFound(format!("tenant {tenant_id}"))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use domain::{Record, WriteResult};

    use super::*;
    use crate::ports::QueryOptions;

    struct StubRepository {
        context: TenantContext,
    }

    #[async_trait]
    impl TenantRepositoryPort for StubRepository {
        fn context(&self) -> &TenantContext {
            &self.context
        }

        async fn create(&self, _table: &str, data: Record) -> Result<Record, ApplicationError> {
            Ok(data)
        }

        async fn find_one(
            &self,
            _table: &str,
            _conditions: Record,
        ) -> Result<Option<Record>, ApplicationError> {
            Ok(None)
        }

        async fn find_many(
            &self,
            _table: &str,
            _conditions: Record,
            _options: &QueryOptions,
        ) -> Result<Vec<Record>, ApplicationError> {
            Ok(Vec::new())
        }

        async fn update(
            &self,
            _table: &str,
            _conditions: Record,
            _data: Record,
        ) -> Result<WriteResult, ApplicationError> {
            Ok(WriteResult::default())
        }

        async fn delete(
            &self,
            _table: &str,
            _conditions: Record,
        ) -> Result<WriteResult, ApplicationError> {
            Ok(WriteResult::default())
        }

        async fn count(&self, _table: &str, _conditions: Record) -> Result<u64, ApplicationError> {
            Ok(0)
        }
    }

    #[derive(Debug)]
    struct StubService {
        tenant_id: TenantId,
        prefix: String,
        shutdowns: Arc<AtomicUsize>,
        fail_shutdown: bool,
    }

    #[async_trait]
    impl TenantService for StubService {
        fn kind(&self) -> &'static str {
            "stub"
        }

        async fn shutdown(&self) -> Result<(), ApplicationError> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            if self.fail_shutdown {
                return Err(ApplicationError::Internal("shutdown failed".to_string()));
            }
            Ok(())
        }

        fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    #[derive(Default)]
    struct StubFactory {
        repositories_built: AtomicUsize,
        shutdowns: Arc<AtomicUsize>,
    }

    impl TenantComponentFactory for StubFactory {
        fn repository(
            &self,
            context: &TenantContext,
        ) -> Result<Arc<dyn TenantRepositoryPort>, ApplicationError> {
            self.repositories_built.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(StubRepository {
                context: context.clone(),
            }))
        }

        fn service(
            &self,
            kind: &str,
            context: &TenantContext,
            _repository: Arc<dyn TenantRepositoryPort>,
            config: &TenantConfig,
        ) -> Result<Arc<dyn TenantService>, ApplicationError> {
            match kind {
                "stub" | "failing" => Ok(Arc::new(StubService {
                    tenant_id: context.tenant_id().clone(),
                    prefix: config.receipt_prefix.clone(),
                    shutdowns: Arc::clone(&self.shutdowns),
                    fail_shutdown: kind == "failing",
                })),
                other => Err(ApplicationError::Configuration(format!(
                    "unknown service kind {other}"
                ))),
            }
        }
    }

    fn tenant(raw: &str) -> TenantId {
        TenantId::parse(raw).unwrap()
    }

    fn container() -> (TenantServiceContainer, Arc<StubFactory>) {
        let factory = Arc::new(StubFactory::default());
        let container = TenantServiceContainer::new(
            Arc::clone(&factory) as Arc<dyn TenantComponentFactory>,
            Arc::new(SchemaGuard::default()),
        );
        (container, factory)
    }

    #[test]
    fn initialize_is_idempotent() {
        let (container, factory) = container();
        assert!(container.initialize_tenant(&tenant("a"), TenantConfig::default()).unwrap());
        assert!(!container.initialize_tenant(&tenant("a"), TenantConfig::default()).unwrap());
        assert_eq!(factory.repositories_built.load(Ordering::SeqCst), 1);
        assert_eq!(container.tenants(), vec![tenant("a")]);
    }

    #[test]
    fn second_initialize_keeps_first_config() {
        let (container, _) = container();
        let first = TenantConfig {
            receipt_prefix: "AAA".to_string(),
            ..TenantConfig::default()
        };
        let second = TenantConfig {
            receipt_prefix: "BBB".to_string(),
            ..TenantConfig::default()
        };
        container.initialize_tenant(&tenant("a"), first).unwrap();
        container.initialize_tenant(&tenant("a"), second).unwrap();

        let service: Arc<StubService> = container.get_service_as(&tenant("a"), "stub").unwrap();
        assert_eq!(service.prefix, "AAA");
    }

    #[test]
    fn repositories_are_cached_per_tenant_and_kind() {
        let (container, _) = container();
        let first = container.get_repository(&tenant("a"), "user").unwrap();
        let again = container.get_repository(&tenant("a"), "user").unwrap();
        let other_kind = container.get_repository(&tenant("a"), "receipt").unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other_kind));
        assert_eq!(first.table(), "users");
        assert_eq!(other_kind.table(), "receipts");
    }

    #[test]
    fn repositories_differ_across_tenants() {
        let (container, _) = container();
        let a = container.get_repository(&tenant("tenantA"), "user").unwrap();
        let b = container.get_repository(&tenant("tenantB"), "user").unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.context().tenant_id().as_str(), "tenantA");
        assert_eq!(b.context().tenant_id().as_str(), "tenantB");
        assert!(container.validate_isolation(&tenant("tenantA"), &tenant("tenantB")));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let (container, _) = container();
        assert!(matches!(
            container.get_repository(&tenant("a"), "counters"),
            Err(ApplicationError::TableNotAllowed(_))
        ));
        assert!(matches!(
            container.get_service(&tenant("a"), "mailer"),
            Err(ApplicationError::Configuration(_))
        ));
    }

    #[test]
    fn services_are_cached_and_typed() {
        let (container, _) = container();
        let first = container.get_service(&tenant("a"), "stub").unwrap();
        let again = container.get_service(&tenant("a"), "stub").unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        let typed: Arc<StubService> = container.get_service_as(&tenant("a"), "stub").unwrap();
        assert_eq!(typed.tenant_id.as_str(), "a");
        assert!(container.get_service_as::<String>(&tenant("a"), "stub").is_err());
    }

    #[test]
    fn isolation_is_false_for_same_or_unknown_tenant() {
        let (container, _) = container();
        container.get_repository(&tenant("a"), "user").unwrap();
        assert!(!container.validate_isolation(&tenant("a"), &tenant("a")));
        assert!(!container.validate_isolation(&tenant("a"), &tenant("missing")));
    }

    #[tokio::test]
    async fn cleanup_runs_every_shutdown_hook_and_evicts() {
        let (container, factory) = container();
        container.get_service(&tenant("a"), "failing").unwrap();
        container.get_service(&tenant("a"), "stub").unwrap();
        let before = container.get_repository(&tenant("a"), "user").unwrap();

        assert!(container.cleanup_tenant(&tenant("a")).await);
        assert_eq!(factory.shutdowns.load(Ordering::SeqCst), 2);
        assert!(!container.is_initialized(&tenant("a")));
        assert!(!container.cleanup_tenant(&tenant("a")).await);

        let after = container.get_repository(&tenant("a"), "user").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(factory.repositories_built.load(Ordering::SeqCst), 2);
    }
}
