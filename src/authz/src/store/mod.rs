//! Rule Store: the single authoritative copy of policy facts
//!
//! Readers load the current [`RuleSet`] through an [`ArcSwap`] and never
//! block. Writers are serialized by an async mutex; each write clones the
//! current rule set, applies its change and publishes the clone with one
//! atomic store, so readers observe either the old or the new rule set and
//! never a mix.
//!
//! ```text
//!   add_edge / remove_edge / remove_node / rebuild
//!                 │ (write lock)
//!                 ▼
//!   clone ─▶ mutate ─▶ version += 1 ─▶ ArcSwap::store ─▶ cache invalidation
//!                                           │
//!   effective_permissions ◀── ArcSwap::load ┘ (lock-free)
//! ```

pub mod cache;
pub mod rules;

pub use cache::{CacheStats, PermissionCache};
pub use rules::{EffectivePermissions, GrantPath, Node, RuleSet};

use crate::config::CacheConfig;
use crate::error::{AuthzError, Result};
use crate::types::{EdgeKind, NodeKind, Snapshot};
use arc_swap::ArcSwap;
use rules::{check_endpoints, Affected};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Records processed between cancellation checks during a rebuild
const REBUILD_CHUNK: usize = 512;

/// Summary of a completed rebuild
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildStats {
    pub permissions: usize,
    pub roles: usize,
    pub groups: usize,
    pub accounts: usize,
    pub edges: usize,
    /// Records or references dropped as invalid
    pub skipped: usize,
    /// Version of the published rule set
    pub version: u64,
}

/// Rule Store with copy-on-write snapshots
pub struct RuleStore {
    current: ArcSwap<RuleSet>,
    write_lock: Mutex<()>,
    cache: Option<PermissionCache>,
}

impl RuleStore {
    /// Create an empty store without caching
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(RuleSet::default()),
            write_lock: Mutex::new(()),
            cache: None,
        }
    }

    /// Create an empty store with the given cache configuration
    pub fn with_cache(config: CacheConfig) -> Self {
        let cache = config.enabled.then(|| PermissionCache::new(config));
        Self {
            current: ArcSwap::from_pointee(RuleSet::default()),
            write_lock: Mutex::new(()),
            cache,
        }
    }

    /// Current rule set
    pub fn snapshot(&self) -> Arc<RuleSet> {
        self.current.load_full()
    }

    pub fn version(&self) -> u64 {
        self.current.load().version
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(PermissionCache::stats)
    }

    /// Add a binding edge, registering or refreshing both endpoints
    ///
    /// Returns `Ok(false)` when nothing changed.
    pub async fn add_edge(&self, kind: EdgeKind, from: Node, to: Node) -> Result<bool> {
        check_endpoints(kind, &from, &to)?;

        let _guard = self.write_lock.lock().await;
        let current = self.current.load_full();

        let unchanged = current.has_edge(kind, from.id(), to.id())
            && node_is_current(&current, &from)
            && node_is_current(&current, &to);
        if unchanged {
            debug!("Edge {} {} -> {} already present", kind, from.id(), to.id());
            return Ok(false);
        }

        let mut next = (*current).clone();
        let mut affected = next.upsert_node(&from);
        affected = merge(affected, next.upsert_node(&to));
        if let Some(edge_affected) = next.insert_edge(kind, from.id(), to.id()) {
            affected = merge(affected, edge_affected);
        }

        self.publish(next, affected);
        debug!("Added edge {} {} -> {}", kind, from.id(), to.id());
        Ok(true)
    }

    /// Remove a binding edge; removing a missing edge is a no-op
    pub async fn remove_edge(&self, kind: EdgeKind, from: &str, to: &str) -> bool {
        let _guard = self.write_lock.lock().await;
        let current = self.current.load_full();

        if !current.has_edge(kind, from, to) {
            debug!("Edge {} {} -> {} not present", kind, from, to);
            return false;
        }

        let mut next = (*current).clone();
        let affected = next.delete_edge(kind, from, to).unwrap_or(Affected::Nothing);
        self.publish(next, affected);
        debug!("Removed edge {} {} -> {}", kind, from, to);
        true
    }

    /// Purge a node and every edge touching it
    pub async fn remove_node(&self, kind: NodeKind, id: &str) -> bool {
        let _guard = self.write_lock.lock().await;
        let current = self.current.load_full();

        let mut next = (*current).clone();
        match next.delete_node(kind, id) {
            Some(affected) => {
                self.publish(next, affected);
                debug!("Purged {} {}", kind, id);
                true
            }
            None => false,
        }
    }

    /// Effective permissions of an account within a tenant
    ///
    /// `None` means the account is unknown to the store.
    pub fn effective_permissions(
        &self,
        account_id: &str,
        tenant_id: &str,
    ) -> Option<Arc<EffectivePermissions>> {
        self.resolve(account_id, tenant_id).0
    }

    /// Like [`effective_permissions`](Self::effective_permissions), also
    /// reporting the cache outcome (`None` when caching is disabled)
    pub fn resolve(
        &self,
        account_id: &str,
        tenant_id: &str,
    ) -> (Option<Arc<EffectivePermissions>>, Option<bool>) {
        let Some(cache) = &self.cache else {
            let resolved = self.current.load().effective_permissions(account_id, tenant_id);
            return (resolved.map(Arc::new), None);
        };

        if let Some(cached) = cache.get(account_id, tenant_id) {
            return (Some(cached), Some(true));
        }

        let rules = self.current.load();
        let resolved = rules.effective_permissions(account_id, tenant_id).map(Arc::new);
        if let Some(resolved) = &resolved {
            cache.put(account_id, tenant_id, rules.version, resolved.clone());
        }

        (resolved, Some(false))
    }

    /// Whether a valid cache entry exists for the pair
    pub fn is_cached(&self, account_id: &str, tenant_id: &str) -> bool {
        self.cache
            .as_ref()
            .is_some_and(|cache| cache.get(account_id, tenant_id).is_some())
    }

    /// Atomically replace the whole rule set from an entity snapshot
    pub async fn rebuild(&self, snapshot: &Snapshot) -> Result<RebuildStats> {
        self.rebuild_with_cancel(snapshot, &CancellationToken::new()).await
    }

    /// Rebuild, aborting without side effects if `token` is cancelled
    pub async fn rebuild_with_cancel(
        &self,
        snapshot: &Snapshot,
        token: &CancellationToken,
    ) -> Result<RebuildStats> {
        let _guard = self.write_lock.lock().await;
        let version = self.current.load().version + 1;

        let (mut next, mut stats) = build_rule_set(snapshot, token).await?;
        next.version = version;
        stats.version = version;
        stats.edges = next.edge_count();

        if token.is_cancelled() {
            return Err(cancelled());
        }

        self.current.store(Arc::new(next));
        if let Some(cache) = &self.cache {
            cache.invalidate_all(version);
        }

        info!(
            "Rule store rebuilt: version={}, roles={}, groups={}, accounts={}, edges={}, skipped={}",
            stats.version, stats.roles, stats.groups, stats.accounts, stats.edges, stats.skipped
        );
        Ok(stats)
    }

    fn publish(&self, mut next: RuleSet, affected: Affected) {
        next.version += 1;
        let version = next.version;
        self.current.store(Arc::new(next));

        if let Some(cache) = &self.cache {
            match affected {
                Affected::Nothing => {}
                Affected::Accounts(accounts) => cache.invalidate_accounts(&accounts, version),
                Affected::Everyone => cache.invalidate_all(version),
            }
        }
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}

fn node_is_current(rules: &RuleSet, node: &Node) -> bool {
    match node {
        Node::Permission { id, name } => rules.permission_name(id) == Some(name),
        Node::Role { id, tenant_id } => rules.tenant_of(NodeKind::Role, id) == Some(tenant_id.as_str()),
        Node::Group { id, tenant_id } => {
            rules.tenant_of(NodeKind::Group, id) == Some(tenant_id.as_str())
        }
        Node::Account { id, tenant_id } => {
            rules.tenant_of(NodeKind::Account, id) == Some(tenant_id.as_str())
        }
    }
}

fn merge(a: Affected, b: Affected) -> Affected {
    match (a, b) {
        (Affected::Everyone, _) | (_, Affected::Everyone) => Affected::Everyone,
        (Affected::Nothing, other) | (other, Affected::Nothing) => other,
        (Affected::Accounts(mut left), Affected::Accounts(right)) => {
            left.extend(right);
            Affected::Accounts(left)
        }
    }
}

fn cancelled() -> AuthzError {
    AuthzError::Cancelled("rule store rebuild aborted; previous rules kept".to_string())
}

/// Cooperative cancellation point, checked every [`REBUILD_CHUNK`] records
async fn checkpoint(processed: &mut usize, token: &CancellationToken) -> Result<()> {
    *processed += 1;
    if *processed % REBUILD_CHUNK == 0 {
        tokio::task::yield_now().await;
    }
    if token.is_cancelled() {
        return Err(cancelled());
    }
    Ok(())
}

fn valid_tagged(kind: NodeKind, id: &str, tenant_id: &str) -> bool {
    if id.is_empty() || tenant_id.is_empty() {
        warn!("Skipping {} {:?} with empty id or tenant", kind, id);
        return false;
    }
    true
}

/// Build a rule set from a snapshot, skipping invalid records
async fn build_rule_set(
    snapshot: &Snapshot,
    token: &CancellationToken,
) -> Result<(RuleSet, RebuildStats)> {
    let mut rules = RuleSet::default();
    let mut stats = RebuildStats {
        skipped: snapshot.skipped,
        ..Default::default()
    };
    let mut processed = 0usize;

    for permission in &snapshot.permissions {
        checkpoint(&mut processed, token).await?;
        if permission.id.is_empty() {
            warn!("Skipping permission {} with empty id", permission.name);
            stats.skipped += 1;
            continue;
        }
        rules.upsert_node(&Node::permission(&permission.id, permission.name.clone()));
        stats.permissions += 1;
    }

    for role in &snapshot.roles {
        checkpoint(&mut processed, token).await?;
        if !valid_tagged(NodeKind::Role, &role.id, &role.tenant_id) {
            stats.skipped += 1;
            continue;
        }
        rules.upsert_node(&Node::role(&role.id, &role.tenant_id));
        stats.roles += 1;
    }

    for group in &snapshot.groups {
        checkpoint(&mut processed, token).await?;
        if !valid_tagged(NodeKind::Group, &group.id, &group.tenant_id) {
            stats.skipped += 1;
            continue;
        }
        rules.upsert_node(&Node::group(&group.id, &group.tenant_id));
        stats.groups += 1;
    }

    for account in &snapshot.accounts {
        checkpoint(&mut processed, token).await?;
        if !valid_tagged(NodeKind::Account, &account.id, &account.tenant_id) {
            stats.skipped += 1;
            continue;
        }
        rules.upsert_node(&Node::account(&account.id, &account.tenant_id));
        stats.accounts += 1;
    }

    // Edges last, once every node is known.
    for role in &snapshot.roles {
        checkpoint(&mut processed, token).await?;
        for perm_id in &role.permission_ids {
            if rules.permission_name(perm_id).is_none() {
                warn!("Skipping role {} -> unknown permission {}", role.id, perm_id);
                stats.skipped += 1;
                continue;
            }
            rules.insert_edge(EdgeKind::RolePermission, &role.id, perm_id);
        }
    }

    for group in &snapshot.groups {
        checkpoint(&mut processed, token).await?;
        for role_id in &group.role_ids {
            if rules.tenant_of(NodeKind::Role, role_id).is_none() {
                warn!("Skipping group {} -> unknown role {}", group.id, role_id);
                stats.skipped += 1;
                continue;
            }
            rules.insert_edge(EdgeKind::GroupRole, &group.id, role_id);
        }
    }

    for account in &snapshot.accounts {
        checkpoint(&mut processed, token).await?;
        for role_id in &account.role_ids {
            if rules.tenant_of(NodeKind::Role, role_id).is_none() {
                warn!("Skipping account {} -> unknown role {}", account.id, role_id);
                stats.skipped += 1;
                continue;
            }
            rules.insert_edge(EdgeKind::AccountRole, &account.id, role_id);
        }
        for group_id in &account.group_ids {
            if rules.tenant_of(NodeKind::Group, group_id).is_none() {
                warn!("Skipping account {} -> unknown group {}", account.id, group_id);
                stats.skipped += 1;
                continue;
            }
            rules.insert_edge(EdgeKind::AccountGroup, &account.id, group_id);
        }
    }

    Ok((rules, stats))
}
