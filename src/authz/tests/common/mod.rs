//! Shared fixtures: the document-sharing world used across suites
//!
//! - permissions `doc:read` (`p-read`), `doc:write` (`p-write`)
//! - role `reader` (t1) → `doc:read`; role `editor` (t1) → both
//! - accounts `alice` (t1, reader), `bob` (t1, editor), `x` (t2, reader)
//! - group `dev-team` (t1) and account `carol` (t1), unbound

#![allow(dead_code)]

use authone_authz::config::CacheConfig;
use authone_authz::engine::ResourceMapper;
use authone_authz::types::{Account, Group, Permission, PermissionName, Role};
use authone_authz::{AuditLog, BindingSynchronizer, DecisionEngine, EntityRepository, InMemoryRepository, RuleStore};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct World {
    pub repo: Arc<InMemoryRepository>,
    pub store: Arc<RuleStore>,
    pub sync: BindingSynchronizer,
    pub engine: DecisionEngine,
    pub audit: Arc<AuditLog>,
}

pub fn resource_paths() -> BTreeMap<String, String> {
    BTreeMap::from([("doc".to_string(), "/docs/".to_string())])
}

pub fn permission(id: &str, name: &str) -> Permission {
    Permission {
        id: id.to_string(),
        name: PermissionName::parse(name).unwrap(),
        description: String::new(),
    }
}

pub fn role(id: &str, tenant: &str) -> Role {
    let mut role = Role::new(tenant, id);
    role.id = id.to_string();
    role
}

pub fn group(id: &str, tenant: &str) -> Group {
    let mut group = Group::new(tenant, id);
    group.id = id.to_string();
    group
}

pub fn account(id: &str, tenant: &str) -> Account {
    let mut account = Account::new(tenant, id, format!("{}@example.com", id));
    account.id = id.to_string();
    account
}

/// Entities only, no relationships
pub async fn entities() -> InMemoryRepository {
    let repo = InMemoryRepository::new();

    repo.insert_permission(permission("p-read", "doc:read")).await.unwrap();
    repo.insert_permission(permission("p-write", "doc:write")).await.unwrap();
    repo.insert_role(role("reader", "t1")).await.unwrap();
    repo.insert_role(role("editor", "t1")).await.unwrap();
    repo.insert_group(group("dev-team", "t1")).await.unwrap();
    for (id, tenant) in [("alice", "t1"), ("bob", "t1"), ("carol", "t1"), ("x", "t2")] {
        repo.insert_account(account(id, tenant)).await.unwrap();
    }

    repo
}

pub async fn world_with_cache(cache: CacheConfig) -> World {
    let repo = Arc::new(entities().await);
    let store = Arc::new(RuleStore::with_cache(cache));
    let audit = Arc::new(AuditLog::new(1024));

    let sync = BindingSynchronizer::new(repo.clone(), store.clone()).with_audit(audit.clone());
    let engine = DecisionEngine::new(store.clone())
        .with_resources(ResourceMapper::new(&resource_paths()))
        .with_audit(audit.clone());

    sync.bind_permission_to_role("reader", "p-read").await.unwrap();
    sync.bind_permission_to_role("editor", "p-read").await.unwrap();
    sync.bind_permission_to_role("editor", "p-write").await.unwrap();
    sync.bind_role_to_account("alice", "reader").await.unwrap();
    sync.bind_role_to_account("bob", "editor").await.unwrap();
    sync.bind_role_to_account("x", "reader").await.unwrap();

    World { repo, store, sync, engine, audit }
}

/// The scenario world, bound through the synchronizer
pub async fn world() -> World {
    world_with_cache(CacheConfig::default()).await
}
