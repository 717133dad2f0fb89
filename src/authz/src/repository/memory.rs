//! In-memory entity repository

use super::EntityRepository;
use crate::error::{AuthzError, Result};
use crate::types::{
    Account, AccountId, EdgeKind, Group, GroupId, Permission, PermissionId, Resource, ResourceId,
    Role, RoleId, Snapshot,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Default)]
struct Tables {
    permissions: HashMap<PermissionId, Permission>,
    roles: HashMap<RoleId, Role>,
    groups: HashMap<GroupId, Group>,
    accounts: HashMap<AccountId, Account>,
    resources: HashMap<ResourceId, Resource>,
}

/// In-memory repository, seeded from a [`Snapshot`] or a JSON file
#[derive(Debug, Default, Clone)]
pub struct InMemoryRepository {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let tables = Tables {
            permissions: snapshot.permissions.into_iter().map(|p| (p.id.clone(), p)).collect(),
            roles: snapshot.roles.into_iter().map(|r| (r.id.clone(), r)).collect(),
            groups: snapshot.groups.into_iter().map(|g| (g.id.clone(), g)).collect(),
            accounts: snapshot.accounts.into_iter().map(|a| (a.id.clone(), a)).collect(),
            resources: snapshot.resources.into_iter().map(|r| (r.id.clone(), r)).collect(),
        };

        Self { tables: Arc::new(RwLock::new(tables)) }
    }

    /// Load a JSON [`Snapshot`] document
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&raw)
            .map_err(|e| AuthzError::Config(format!("seed file {}: {}", path.display(), e)))?;

        info!("Loaded {} entities from {}", snapshot.len(), path.display());
        Ok(Self::from_snapshot(snapshot))
    }
}

/// Relationship set on the `from` side of `kind`
fn relation_set<'a>(
    tables: &'a mut Tables,
    kind: EdgeKind,
    from: &str,
) -> Result<&'a mut std::collections::BTreeSet<String>> {
    let set = match kind {
        EdgeKind::RolePermission => tables.roles.get_mut(from).map(|r| &mut r.permission_ids),
        EdgeKind::AccountRole => tables.accounts.get_mut(from).map(|a| &mut a.role_ids),
        EdgeKind::GroupRole => tables.groups.get_mut(from).map(|g| &mut g.role_ids),
        EdgeKind::AccountGroup => tables.accounts.get_mut(from).map(|a| &mut a.group_ids),
    };

    set.ok_or_else(|| AuthzError::not_found(kind.endpoints().0.as_str(), from))
}

fn target_exists(tables: &Tables, kind: EdgeKind, to: &str) -> bool {
    match kind {
        EdgeKind::RolePermission => tables.permissions.contains_key(to),
        EdgeKind::AccountRole | EdgeKind::GroupRole => tables.roles.contains_key(to),
        EdgeKind::AccountGroup => tables.groups.contains_key(to),
    }
}

fn sorted<T, K: Ord>(values: impl Iterator<Item = T>, key: impl Fn(&T) -> K) -> Vec<T> {
    let mut values: Vec<T> = values.collect();
    values.sort_by_key(|v| key(v));
    values
}

#[async_trait]
impl EntityRepository for InMemoryRepository {
    async fn get_permission(&self, id: &str) -> Result<Option<Permission>> {
        Ok(self.tables.read().await.permissions.get(id).cloned())
    }

    async fn get_role(&self, id: &str) -> Result<Option<Role>> {
        Ok(self.tables.read().await.roles.get(id).cloned())
    }

    async fn get_group(&self, id: &str) -> Result<Option<Group>> {
        Ok(self.tables.read().await.groups.get(id).cloned())
    }

    async fn get_account(&self, id: &str) -> Result<Option<Account>> {
        Ok(self.tables.read().await.accounts.get(id).cloned())
    }

    async fn get_resource(&self, id: &str) -> Result<Option<Resource>> {
        Ok(self.tables.read().await.resources.get(id).cloned())
    }

    async fn insert_permission(&self, permission: Permission) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.permissions.insert(permission.id.clone(), permission);
        Ok(())
    }

    async fn insert_role(&self, role: Role) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.roles.insert(role.id.clone(), role);
        Ok(())
    }

    async fn insert_group(&self, group: Group) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.groups.insert(group.id.clone(), group);
        Ok(())
    }

    async fn insert_account(&self, account: Account) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    async fn insert_resource(&self, resource: Resource) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.resources.insert(resource.id.clone(), resource);
        Ok(())
    }

    async fn link(&self, kind: EdgeKind, from: &str, to: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if !target_exists(&tables, kind, to) {
            return Err(AuthzError::not_found(kind.endpoints().1.as_str(), to));
        }
        Ok(relation_set(&mut tables, kind, from)?.insert(to.to_string()))
    }

    async fn unlink(&self, kind: EdgeKind, from: &str, to: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(relation_set(&mut tables, kind, from)?.remove(to))
    }

    async fn delete_permission(&self, id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.permissions.remove(id).is_none() {
            return Ok(false);
        }
        for role in tables.roles.values_mut() {
            role.permission_ids.remove(id);
        }
        Ok(true)
    }

    async fn delete_role(&self, id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.roles.remove(id).is_none() {
            return Ok(false);
        }
        for account in tables.accounts.values_mut() {
            account.role_ids.remove(id);
        }
        for group in tables.groups.values_mut() {
            group.role_ids.remove(id);
        }
        Ok(true)
    }

    async fn delete_group(&self, id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.groups.remove(id).is_none() {
            return Ok(false);
        }
        for account in tables.accounts.values_mut() {
            account.group_ids.remove(id);
        }
        Ok(true)
    }

    async fn delete_account(&self, id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.accounts.remove(id).is_some())
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        let tables = self.tables.read().await;

        Ok(Snapshot {
            permissions: sorted(tables.permissions.values().cloned(), |p| p.id.clone()),
            roles: sorted(tables.roles.values().cloned(), |r| r.id.clone()),
            groups: sorted(tables.groups.values().cloned(), |g| g.id.clone()),
            accounts: sorted(tables.accounts.values().cloned(), |a| a.id.clone()),
            resources: sorted(tables.resources.values().cloned(), |r| r.id.clone()),
            skipped: 0,
        })
    }
}
