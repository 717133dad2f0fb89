//! Rule set: tenant-tagged nodes and binding edges
//!
//! A [`RuleSet`] is an immutable value once published by the
//! [`RuleStore`](super::RuleStore). Writers clone it, mutate the clone and
//! publish the result; node records are `Arc`-shared so a clone copies
//! pointers, not edge sets.

use crate::error::{AuthzError, Result};
use crate::types::{
    AccountId, EdgeKind, GroupId, NodeKind, PermissionId, PermissionName, RoleId, TenantId,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// A binding endpoint together with the tag the rule set stores for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Permission { id: PermissionId, name: PermissionName },
    Role { id: RoleId, tenant_id: TenantId },
    Group { id: GroupId, tenant_id: TenantId },
    Account { id: AccountId, tenant_id: TenantId },
}

impl Node {
    pub fn permission(id: impl Into<PermissionId>, name: PermissionName) -> Self {
        Node::Permission { id: id.into(), name }
    }

    pub fn role(id: impl Into<RoleId>, tenant_id: impl Into<TenantId>) -> Self {
        Node::Role { id: id.into(), tenant_id: tenant_id.into() }
    }

    pub fn group(id: impl Into<GroupId>, tenant_id: impl Into<TenantId>) -> Self {
        Node::Group { id: id.into(), tenant_id: tenant_id.into() }
    }

    pub fn account(id: impl Into<AccountId>, tenant_id: impl Into<TenantId>) -> Self {
        Node::Account { id: id.into(), tenant_id: tenant_id.into() }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Permission { .. } => NodeKind::Permission,
            Node::Role { .. } => NodeKind::Role,
            Node::Group { .. } => NodeKind::Group,
            Node::Account { .. } => NodeKind::Account,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Node::Permission { id, .. }
            | Node::Role { id, .. }
            | Node::Group { id, .. }
            | Node::Account { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RoleRules {
    pub(crate) tenant_id: TenantId,
    pub(crate) permissions: BTreeSet<PermissionId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct GroupRules {
    pub(crate) tenant_id: TenantId,
    pub(crate) roles: BTreeSet<RoleId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct AccountRules {
    pub(crate) tenant_id: TenantId,
    pub(crate) roles: BTreeSet<RoleId>,
    pub(crate) groups: BTreeSet<GroupId>,
}

/// Path through which an effective role reaches an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantPath {
    Direct,
    Group(GroupId),
}

/// Resolved permissions of one account within one tenant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectivePermissions {
    /// Effective roles and the first path that reached each of them
    pub roles: BTreeMap<RoleId, GrantPath>,

    /// Permission name → first granting role (role-id order)
    pub permissions: BTreeMap<String, RoleId>,
}

impl EffectivePermissions {
    pub fn contains(&self, permission: &str) -> bool {
        self.permissions.contains_key(permission)
    }

    /// Role that grants `permission`, if any
    pub fn granted_by(&self, permission: &str) -> Option<&RoleId> {
        self.permissions.get(permission)
    }

    pub fn role_ids(&self) -> Vec<RoleId> {
        self.roles.keys().cloned().collect()
    }
}

/// Complete, versioned set of policy facts
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub(crate) version: u64,
    pub(crate) permissions: HashMap<PermissionId, PermissionName>,
    pub(crate) roles: HashMap<RoleId, Arc<RoleRules>>,
    pub(crate) groups: HashMap<GroupId, Arc<GroupRules>>,
    pub(crate) accounts: HashMap<AccountId, Arc<AccountRules>>,

    // Reverse indexes for cache invalidation
    pub(crate) role_accounts: HashMap<RoleId, HashSet<AccountId>>,
    pub(crate) role_groups: HashMap<RoleId, HashSet<GroupId>>,
    pub(crate) group_accounts: HashMap<GroupId, HashSet<AccountId>>,
}

/// Accounts whose effective permissions may have changed after a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Affected {
    Nothing,
    Accounts(HashSet<AccountId>),
    Everyone,
}

impl RuleSet {
    /// Monotonic version, bumped by every published write
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn contains_account(&self, account_id: &str) -> bool {
        self.accounts.contains_key(account_id)
    }

    /// Tenant of an account, role or group node
    pub fn tenant_of(&self, kind: NodeKind, id: &str) -> Option<&str> {
        match kind {
            NodeKind::Account => self.accounts.get(id).map(|a| a.tenant_id.as_str()),
            NodeKind::Role => self.roles.get(id).map(|r| r.tenant_id.as_str()),
            NodeKind::Group => self.groups.get(id).map(|g| g.tenant_id.as_str()),
            NodeKind::Permission => None,
        }
    }

    pub fn permission_name(&self, id: &str) -> Option<&PermissionName> {
        self.permissions.get(id)
    }

    pub fn has_edge(&self, kind: EdgeKind, from: &str, to: &str) -> bool {
        match kind {
            EdgeKind::RolePermission => {
                self.roles.get(from).is_some_and(|r| r.permissions.contains(to))
            }
            EdgeKind::AccountRole => self.accounts.get(from).is_some_and(|a| a.roles.contains(to)),
            EdgeKind::GroupRole => self.groups.get(from).is_some_and(|g| g.roles.contains(to)),
            EdgeKind::AccountGroup => {
                self.accounts.get(from).is_some_and(|a| a.groups.contains(to))
            }
        }
    }

    /// Number of edges of all kinds
    pub fn edge_count(&self) -> usize {
        self.roles.values().map(|r| r.permissions.len()).sum::<usize>()
            + self.groups.values().map(|g| g.roles.len()).sum::<usize>()
            + self
                .accounts
                .values()
                .map(|a| a.roles.len() + a.groups.len())
                .sum::<usize>()
    }

    /// Sorted `(kind, from, to)` triples; equal for equal rule sets
    pub fn edges(&self) -> BTreeSet<(EdgeKind, String, String)> {
        let mut edges = BTreeSet::new();

        for (role_id, role) in &self.roles {
            for perm in &role.permissions {
                edges.insert((EdgeKind::RolePermission, role_id.clone(), perm.clone()));
            }
        }
        for (group_id, group) in &self.groups {
            for role in &group.roles {
                edges.insert((EdgeKind::GroupRole, group_id.clone(), role.clone()));
            }
        }
        for (account_id, account) in &self.accounts {
            for role in &account.roles {
                edges.insert((EdgeKind::AccountRole, account_id.clone(), role.clone()));
            }
            for group in &account.groups {
                edges.insert((EdgeKind::AccountGroup, account_id.clone(), group.clone()));
            }
        }

        edges
    }

    /// Resolve the effective permissions of an account within a tenant
    ///
    /// Returns `None` for an unknown account. An account resolves nothing
    /// outside its own tenant, and roles and groups whose own tenant differs
    /// from `tenant_id` contribute nothing, whatever their bindings say.
    pub fn effective_permissions(
        &self,
        account_id: &str,
        tenant_id: &str,
    ) -> Option<EffectivePermissions> {
        let account = self.accounts.get(account_id)?;
        let mut resolved = EffectivePermissions::default();
        if account.tenant_id != tenant_id {
            return Some(resolved);
        }

        for role_id in &account.roles {
            if self.role_in_tenant(role_id, tenant_id) {
                resolved.roles.insert(role_id.clone(), GrantPath::Direct);
            }
        }

        for group_id in &account.groups {
            let Some(group) = self.groups.get(group_id) else {
                continue;
            };
            if group.tenant_id != tenant_id {
                continue;
            }

            for role_id in &group.roles {
                if self.role_in_tenant(role_id, tenant_id) {
                    resolved
                        .roles
                        .entry(role_id.clone())
                        .or_insert_with(|| GrantPath::Group(group_id.clone()));
                }
            }
        }

        for role_id in resolved.roles.keys() {
            let Some(role) = self.roles.get(role_id) else {
                continue;
            };
            for perm_id in &role.permissions {
                if let Some(name) = self.permissions.get(perm_id) {
                    resolved
                        .permissions
                        .entry(name.as_str().to_string())
                        .or_insert_with(|| role_id.clone());
                }
            }
        }

        Some(resolved)
    }

    fn role_in_tenant(&self, role_id: &str, tenant_id: &str) -> bool {
        self.roles.get(role_id).is_some_and(|r| r.tenant_id == tenant_id)
    }

    /// Register a node or refresh its tag
    pub(crate) fn upsert_node(&mut self, node: &Node) -> Affected {
        match node {
            Node::Permission { id, name } => match self.permissions.get(id) {
                Some(existing) if existing == name => Affected::Nothing,
                Some(_) => {
                    self.permissions.insert(id.clone(), name.clone());
                    Affected::Everyone
                }
                None => {
                    self.permissions.insert(id.clone(), name.clone());
                    Affected::Nothing
                }
            },
            Node::Role { id, tenant_id } => match self.roles.get_mut(id) {
                Some(role) if role.tenant_id == *tenant_id => Affected::Nothing,
                Some(role) => {
                    Arc::make_mut(role).tenant_id = tenant_id.clone();
                    Affected::Accounts(self.accounts_reaching_role(id))
                }
                None => {
                    self.roles.insert(
                        id.clone(),
                        Arc::new(RoleRules { tenant_id: tenant_id.clone(), ..Default::default() }),
                    );
                    Affected::Nothing
                }
            },
            Node::Group { id, tenant_id } => match self.groups.get_mut(id) {
                Some(group) if group.tenant_id == *tenant_id => Affected::Nothing,
                Some(group) => {
                    Arc::make_mut(group).tenant_id = tenant_id.clone();
                    Affected::Accounts(self.accounts_in_group(id))
                }
                None => {
                    self.groups.insert(
                        id.clone(),
                        Arc::new(GroupRules { tenant_id: tenant_id.clone(), ..Default::default() }),
                    );
                    Affected::Nothing
                }
            },
            Node::Account { id, tenant_id } => match self.accounts.get_mut(id) {
                Some(account) if account.tenant_id == *tenant_id => Affected::Nothing,
                Some(account) => {
                    Arc::make_mut(account).tenant_id = tenant_id.clone();
                    Affected::Accounts(HashSet::from([id.clone()]))
                }
                None => {
                    self.accounts.insert(
                        id.clone(),
                        Arc::new(AccountRules { tenant_id: tenant_id.clone(), ..Default::default() }),
                    );
                    Affected::Nothing
                }
            },
        }
    }

    /// Insert an edge whose endpoints are already registered
    ///
    /// Returns the accounts affected, or `None` if the edge already existed.
    pub(crate) fn insert_edge(&mut self, kind: EdgeKind, from: &str, to: &str) -> Option<Affected> {
        let inserted = match kind {
            EdgeKind::RolePermission => self
                .roles
                .get_mut(from)
                .is_some_and(|r| Arc::make_mut(r).permissions.insert(to.to_string())),
            EdgeKind::AccountRole => {
                let inserted = self
                    .accounts
                    .get_mut(from)
                    .is_some_and(|a| Arc::make_mut(a).roles.insert(to.to_string()));
                if inserted {
                    self.role_accounts.entry(to.to_string()).or_default().insert(from.to_string());
                }
                inserted
            }
            EdgeKind::GroupRole => {
                let inserted = self
                    .groups
                    .get_mut(from)
                    .is_some_and(|g| Arc::make_mut(g).roles.insert(to.to_string()));
                if inserted {
                    self.role_groups.entry(to.to_string()).or_default().insert(from.to_string());
                }
                inserted
            }
            EdgeKind::AccountGroup => {
                let inserted = self
                    .accounts
                    .get_mut(from)
                    .is_some_and(|a| Arc::make_mut(a).groups.insert(to.to_string()));
                if inserted {
                    self.group_accounts.entry(to.to_string()).or_default().insert(from.to_string());
                }
                inserted
            }
        };

        inserted.then(|| self.affected_by_edge(kind, from))
    }

    /// Remove an edge; `None` if it did not exist
    pub(crate) fn delete_edge(&mut self, kind: EdgeKind, from: &str, to: &str) -> Option<Affected> {
        if !self.has_edge(kind, from, to) {
            return None;
        }

        // Computed before removal so the reverse indexes still list the accounts.
        let affected = self.affected_by_edge(kind, from);

        match kind {
            EdgeKind::RolePermission => {
                if let Some(role) = self.roles.get_mut(from) {
                    Arc::make_mut(role).permissions.remove(to);
                }
            }
            EdgeKind::AccountRole => {
                if let Some(account) = self.accounts.get_mut(from) {
                    Arc::make_mut(account).roles.remove(to);
                }
                remove_reverse(&mut self.role_accounts, to, from);
            }
            EdgeKind::GroupRole => {
                if let Some(group) = self.groups.get_mut(from) {
                    Arc::make_mut(group).roles.remove(to);
                }
                remove_reverse(&mut self.role_groups, to, from);
            }
            EdgeKind::AccountGroup => {
                if let Some(account) = self.accounts.get_mut(from) {
                    Arc::make_mut(account).groups.remove(to);
                }
                remove_reverse(&mut self.group_accounts, to, from);
            }
        }

        Some(affected)
    }

    /// Remove a node and every incident edge; `None` if it did not exist
    pub(crate) fn delete_node(&mut self, kind: NodeKind, id: &str) -> Option<Affected> {
        match kind {
            NodeKind::Permission => {
                self.permissions.remove(id)?;
                for role in self.roles.values_mut() {
                    if role.permissions.contains(id) {
                        Arc::make_mut(role).permissions.remove(id);
                    }
                }
                Some(Affected::Everyone)
            }
            NodeKind::Role => {
                if !self.roles.contains_key(id) {
                    return None;
                }
                let affected = self.accounts_reaching_role(id);

                self.roles.remove(id);
                for account_id in self.role_accounts.remove(id).unwrap_or_default() {
                    if let Some(account) = self.accounts.get_mut(&account_id) {
                        Arc::make_mut(account).roles.remove(id);
                    }
                }
                for group_id in self.role_groups.remove(id).unwrap_or_default() {
                    if let Some(group) = self.groups.get_mut(&group_id) {
                        Arc::make_mut(group).roles.remove(id);
                    }
                }
                Some(Affected::Accounts(affected))
            }
            NodeKind::Group => {
                let group = self.groups.remove(id)?;
                let members = self.group_accounts.remove(id).unwrap_or_default();

                for account_id in &members {
                    if let Some(account) = self.accounts.get_mut(account_id) {
                        Arc::make_mut(account).groups.remove(id);
                    }
                }
                for role_id in &group.roles {
                    remove_reverse(&mut self.role_groups, role_id, id);
                }
                Some(Affected::Accounts(members))
            }
            NodeKind::Account => {
                let account = self.accounts.remove(id)?;
                for role_id in &account.roles {
                    remove_reverse(&mut self.role_accounts, role_id, id);
                }
                for group_id in &account.groups {
                    remove_reverse(&mut self.group_accounts, group_id, id);
                }
                Some(Affected::Accounts(HashSet::from([id.to_string()])))
            }
        }
    }

    fn affected_by_edge(&self, kind: EdgeKind, from: &str) -> Affected {
        let accounts = match kind {
            EdgeKind::AccountRole | EdgeKind::AccountGroup => HashSet::from([from.to_string()]),
            EdgeKind::GroupRole => self.accounts_in_group(from),
            EdgeKind::RolePermission => self.accounts_reaching_role(from),
        };
        Affected::Accounts(accounts)
    }

    fn accounts_in_group(&self, group_id: &str) -> HashSet<AccountId> {
        self.group_accounts.get(group_id).cloned().unwrap_or_default()
    }

    fn accounts_reaching_role(&self, role_id: &str) -> HashSet<AccountId> {
        let mut accounts = self.role_accounts.get(role_id).cloned().unwrap_or_default();
        if let Some(groups) = self.role_groups.get(role_id) {
            for group_id in groups {
                accounts.extend(self.accounts_in_group(group_id));
            }
        }
        accounts
    }
}

fn remove_reverse(index: &mut HashMap<String, HashSet<String>>, key: &str, member: &str) {
    if let Some(members) = index.get_mut(key) {
        members.remove(member);
        if members.is_empty() {
            index.remove(key);
        }
    }
}

/// Check that `from`/`to` fit the endpoints of `kind`
pub(crate) fn check_endpoints(kind: EdgeKind, from: &Node, to: &Node) -> Result<()> {
    let (from_kind, to_kind) = kind.endpoints();
    if from.kind() != from_kind || to.kind() != to_kind {
        return Err(AuthzError::Validation(format!(
            "{} edge expects {} -> {}, got {} -> {}",
            kind,
            from_kind,
            to_kind,
            from.kind(),
            to.kind()
        )));
    }
    Ok(())
}
