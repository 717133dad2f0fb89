use crate::audit::AuditLog;
use crate::config::AuthzConfig;
use crate::engine::{DecisionEngine, ResourceMapper};
use crate::repository::EntityRepository;
use crate::store::RuleStore;
use crate::sync::BindingSynchronizer;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
pub struct AppState {
    pub engine: Arc<DecisionEngine>,
    pub sync: Arc<BindingSynchronizer>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(engine: Arc<DecisionEngine>, sync: Arc<BindingSynchronizer>) -> Self {
        Self {
            engine,
            sync,
            start_time: Instant::now(),
        }
    }

    /// Wire store, engine and synchronizer over one repository
    pub fn from_config(config: &AuthzConfig, repository: Arc<dyn EntityRepository>) -> Self {
        let store = Arc::new(RuleStore::with_cache(config.cache.clone()));
        let audit = config
            .audit
            .enabled
            .then(|| Arc::new(AuditLog::new(config.audit.capacity)));

        let mut engine = DecisionEngine::new(store.clone())
            .with_resources(ResourceMapper::new(&config.resource_paths));
        let mut sync = BindingSynchronizer::new(repository, store);
        if let Some(audit) = audit {
            engine = engine.with_audit(audit.clone());
            sync = sync.with_audit(audit);
        }

        Self::new(Arc::new(engine), Arc::new(sync))
    }
}
