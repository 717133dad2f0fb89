//! Decision Engine
//!
//! Evaluates an [`AccessRequest`] against the current Rule Store snapshot.
//!
//! ```text
//! AccessRequest ─▶ validate ─▶ tenant? ─▶ effective permissions (cache ▸ snapshot)
//!                                                   │
//!                      canonical(resource):action ──┴─▶ AccessDecision
//!                                                          │
//!                                                 [Metrics] [Audit Log]
//! ```
//!
//! A check never blocks on writers and never fails because of a deny; errors
//! are reserved for malformed requests.

pub mod decision;
pub mod metrics;
pub mod resource;

pub use decision::{AccessDecision, AccessRequest, DecisionReason};
pub use metrics::{EngineMetrics, MetricsCollector};
pub use resource::ResourceMapper;

use crate::audit::{AuditEntry, AuditKind, AuditLog};
use crate::error::{AuthzError, Result};
use crate::store::RuleStore;

use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Decision Engine over a shared Rule Store
pub struct DecisionEngine {
    store: Arc<RuleStore>,
    resources: ResourceMapper,
    audit: Option<Arc<AuditLog>>,
    metrics: Arc<MetricsCollector>,
}

impl DecisionEngine {
    /// Engine with an identity resource mapping and no audit trail
    pub fn new(store: Arc<RuleStore>) -> Self {
        Self {
            store,
            resources: ResourceMapper::default(),
            audit: None,
            metrics: Arc::new(MetricsCollector::new()),
        }
    }

    pub fn with_resources(mut self, resources: ResourceMapper) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn store(&self) -> &Arc<RuleStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Decide whether the account may perform the action on the resource
    pub fn check(&self, request: &AccessRequest) -> Result<AccessDecision> {
        let start = Instant::now();

        if let Err(e) = validate(request) {
            self.metrics.record_validation_error();
            return Err(e);
        }

        debug!(
            "Access check: account={}, tenant={:?}, resource={}, action={}",
            request.account_id, request.tenant_id, request.resource, request.action
        );

        let decision = self.evaluate(request);

        debug!(
            "Decision: {} ({})",
            if decision.allowed { "ALLOW" } else { "DENY" },
            decision.reason
        );

        self.metrics.record_decision(decision.allowed, start.elapsed());
        if let Some(audit) = &self.audit {
            audit.record(
                AuditEntry::new(
                    AuditKind::AccessCheck,
                    &request.account_id,
                    &request.action,
                    &request.resource,
                )
                .with_outcome(decision.allowed)
                .with_message(decision.reason.to_string()),
            );
        }

        Ok(decision)
    }

    /// Boolean shorthand for [`check`](Self::check)
    pub fn may(
        &self,
        account_id: &str,
        tenant_id: &str,
        resource: &str,
        action: &str,
    ) -> Result<bool> {
        let request = AccessRequest::new(account_id, tenant_id, resource, action);
        Ok(self.check(&request)?.allowed)
    }

    fn evaluate(&self, request: &AccessRequest) -> AccessDecision {
        let Some(tenant_id) = request.tenant_id.as_deref().filter(|t| !t.is_empty()) else {
            return AccessDecision::deny(DecisionReason::NoTenant, Vec::new());
        };

        let (resolved, cached) = self.store.resolve(&request.account_id, tenant_id);
        match cached {
            Some(true) => self.metrics.record_cache_hit(),
            Some(false) => self.metrics.record_cache_miss(),
            None => {}
        }

        let Some(resolved) = resolved else {
            return AccessDecision::deny(DecisionReason::UnknownAccount, Vec::new());
        };

        if resolved.roles.is_empty() {
            return AccessDecision::deny(DecisionReason::NoEffectiveRoles, Vec::new());
        }

        let effective_roles = resolved.role_ids();
        debug!("Effective roles in {}: {:?}", tenant_id, effective_roles);

        let requested = format!(
            "{}:{}",
            self.resources.canonical(&request.resource),
            request.action
        );

        match resolved.granted_by(&requested) {
            Some(role_id) => AccessDecision::allow(role_id.clone(), effective_roles),
            None => AccessDecision::deny(
                DecisionReason::NotGranted { permission: requested },
                effective_roles,
            ),
        }
    }
}

fn validate(request: &AccessRequest) -> Result<()> {
    for (field, value) in [
        ("account_id", &request.account_id),
        ("resource", &request.resource),
        ("action", &request.action),
    ] {
        if value.trim().is_empty() {
            return Err(AuthzError::Validation(format!("{} must not be empty", field)));
        }
    }
    Ok(())
}
