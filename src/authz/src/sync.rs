//! Binding Synchronizer
//!
//! Turns relationship mutations into repository writes followed by Rule
//! Store deltas, and rebuilds the Rule Store from a full repository read.
//!
//! Binds and unbinds hold the sync gate shared for their whole
//! repository-then-store sequence. Deletes hold it exclusively, and so does a
//! rebuild from the snapshot read to the publish. A bind therefore lands
//! entirely before or entirely after a delete or a rebuild, never between.

use crate::audit::{AuditEntry, AuditKind, AuditLog};
use crate::error::{AuthzError, Result};
use crate::repository::EntityRepository;
use crate::store::{Node, RebuildStats, RuleStore};
use crate::types::{EdgeKind, NodeKind};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of a bind or unbind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindOutcome {
    /// The relationship was created
    Bound,
    /// The relationship was removed
    Unbound,
    /// Nothing changed
    Unchanged,
}

pub struct BindingSynchronizer {
    repository: Arc<dyn EntityRepository>,
    store: Arc<RuleStore>,
    audit: Option<Arc<AuditLog>>,
    gate: RwLock<()>,
}

impl BindingSynchronizer {
    pub fn new(repository: Arc<dyn EntityRepository>, store: Arc<RuleStore>) -> Self {
        Self {
            repository,
            store,
            audit: None,
            gate: RwLock::new(()),
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn store(&self) -> &Arc<RuleStore> {
        &self.store
    }

    pub fn repository(&self) -> &Arc<dyn EntityRepository> {
        &self.repository
    }

    pub async fn bind_permission_to_role(
        &self,
        role_id: &str,
        permission_id: &str,
    ) -> Result<BindOutcome> {
        self.bind(EdgeKind::RolePermission, role_id, permission_id).await
    }

    pub async fn bind_role_to_account(&self, account_id: &str, role_id: &str) -> Result<BindOutcome> {
        self.bind(EdgeKind::AccountRole, account_id, role_id).await
    }

    pub async fn bind_role_to_group(&self, group_id: &str, role_id: &str) -> Result<BindOutcome> {
        self.bind(EdgeKind::GroupRole, group_id, role_id).await
    }

    pub async fn bind_group_to_account(
        &self,
        account_id: &str,
        group_id: &str,
    ) -> Result<BindOutcome> {
        self.bind(EdgeKind::AccountGroup, account_id, group_id).await
    }

    pub async fn unbind_permission_from_role(
        &self,
        role_id: &str,
        permission_id: &str,
    ) -> Result<BindOutcome> {
        self.unbind(EdgeKind::RolePermission, role_id, permission_id).await
    }

    pub async fn unbind_role_from_account(
        &self,
        account_id: &str,
        role_id: &str,
    ) -> Result<BindOutcome> {
        self.unbind(EdgeKind::AccountRole, account_id, role_id).await
    }

    pub async fn unbind_role_from_group(&self, group_id: &str, role_id: &str) -> Result<BindOutcome> {
        self.unbind(EdgeKind::GroupRole, group_id, role_id).await
    }

    pub async fn unbind_group_from_account(
        &self,
        account_id: &str,
        group_id: &str,
    ) -> Result<BindOutcome> {
        self.unbind(EdgeKind::AccountGroup, account_id, group_id).await
    }

    pub async fn delete_permission(&self, id: &str) -> Result<bool> {
        self.delete(NodeKind::Permission, id).await
    }

    pub async fn delete_role(&self, id: &str) -> Result<bool> {
        self.delete(NodeKind::Role, id).await
    }

    pub async fn delete_group(&self, id: &str) -> Result<bool> {
        self.delete(NodeKind::Group, id).await
    }

    pub async fn delete_account(&self, id: &str) -> Result<bool> {
        self.delete(NodeKind::Account, id).await
    }

    /// Replace the Rule Store contents with a full repository read
    pub async fn rebuild(&self) -> Result<RebuildStats> {
        self.rebuild_with_cancel(&CancellationToken::new()).await
    }

    pub async fn rebuild_with_cancel(&self, token: &CancellationToken) -> Result<RebuildStats> {
        let _gate = self.gate.write().await;

        let snapshot = self.repository.snapshot().await?;
        if snapshot.is_empty() {
            warn!("Repository is empty, rebuilding an empty rule store");
        } else {
            info!("Rebuilding rule store from {} entities", snapshot.len());
        }

        let stats = self.store.rebuild_with_cancel(&snapshot, token).await?;

        if let Some(audit) = &self.audit {
            audit.record(
                AuditEntry::new(AuditKind::Rebuild, "synchronizer", "rebuild", "rule_store")
                    .with_message(format!(
                        "version {} with {} edges ({} skipped)",
                        stats.version, stats.edges, stats.skipped
                    )),
            );
        }

        Ok(stats)
    }

    async fn bind(&self, kind: EdgeKind, from_id: &str, to_id: &str) -> Result<BindOutcome> {
        let _gate = self.gate.read().await;
        let (from_kind, to_kind) = kind.endpoints();

        let from = self.node(from_kind, from_id).await?;
        let to = self.node(to_kind, to_id).await?;

        if let (Some(from_tenant), Some(to_tenant)) = (tenant(&from), tenant(&to)) {
            if from_tenant != to_tenant {
                self.record_mismatch(kind, &from, from_tenant, &to, to_tenant);
            }
        }

        let linked = self.repository.link(kind, from_id, to_id).await?;
        let changed = self.store.add_edge(kind, from, to).await?;

        debug!("Bind {} {} -> {}: linked={}, changed={}", kind, from_id, to_id, linked, changed);
        Ok(if linked || changed {
            BindOutcome::Bound
        } else {
            BindOutcome::Unchanged
        })
    }

    async fn unbind(&self, kind: EdgeKind, from_id: &str, to_id: &str) -> Result<BindOutcome> {
        let _gate = self.gate.read().await;
        let (from_kind, to_kind) = kind.endpoints();

        self.node(from_kind, from_id).await?;
        self.node(to_kind, to_id).await?;

        let unlinked = self.repository.unlink(kind, from_id, to_id).await?;
        let changed = self.store.remove_edge(kind, from_id, to_id).await;

        debug!("Unbind {} {} -> {}: unlinked={}, changed={}", kind, from_id, to_id, unlinked, changed);
        Ok(if unlinked || changed {
            BindOutcome::Unbound
        } else {
            BindOutcome::Unchanged
        })
    }

    async fn delete(&self, kind: NodeKind, id: &str) -> Result<bool> {
        // Exclusive: a bind that already looked up this entity must not
        // re-register it after the purge.
        let _gate = self.gate.write().await;

        let deleted = match kind {
            NodeKind::Permission => self.repository.delete_permission(id).await?,
            NodeKind::Role => self.repository.delete_role(id).await?,
            NodeKind::Group => self.repository.delete_group(id).await?,
            NodeKind::Account => self.repository.delete_account(id).await?,
        };
        let purged = self.store.remove_node(kind, id).await;

        if deleted {
            info!("Deleted {} {}", kind, id);
        } else if purged {
            warn!("Purged {} {} from rule store, missing from repository", kind, id);
        }
        Ok(deleted || purged)
    }

    /// Look up an entity and turn it into a tagged rule-store node
    async fn node(&self, kind: NodeKind, id: &str) -> Result<Node> {
        let node = match kind {
            NodeKind::Permission => self
                .repository
                .get_permission(id)
                .await?
                .map(|p| Node::permission(p.id, p.name)),
            NodeKind::Role => self.repository.get_role(id).await?.map(|r| Node::role(r.id, r.tenant_id)),
            NodeKind::Group => {
                self.repository.get_group(id).await?.map(|g| Node::group(g.id, g.tenant_id))
            }
            NodeKind::Account => self
                .repository
                .get_account(id)
                .await?
                .map(|a| Node::account(a.id, a.tenant_id)),
        };

        node.ok_or_else(|| AuthzError::not_found(kind.as_str(), id))
    }

    fn record_mismatch(&self, kind: EdgeKind, from: &Node, from_tenant: &str, to: &Node, to_tenant: &str) {
        let message = format!(
            "{} {} in tenant {} bound to {} {} in tenant {}",
            from.kind(),
            from.id(),
            from_tenant,
            to.kind(),
            to.id(),
            to_tenant
        );
        warn!("Cross-tenant {} binding: {}", kind, message);

        if let Some(audit) = &self.audit {
            audit.record(
                AuditEntry::new(AuditKind::TenantMismatch, from.id(), kind.as_str(), to.id())
                    .with_message(message),
            );
        }
    }
}

/// Tenant tag of a node; permissions are global
fn tenant(node: &Node) -> Option<&str> {
    match node {
        Node::Permission { .. } => None,
        Node::Role { tenant_id, .. }
        | Node::Group { tenant_id, .. }
        | Node::Account { tenant_id, .. } => Some(tenant_id),
    }
}
