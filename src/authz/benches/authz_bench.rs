//! Decision Engine and Rule Store benchmarks
//!
//! Measures `check` with and without the permission cache, incremental binds
//! and full rebuilds across rule-set sizes.

use authone_authz::config::CacheConfig;
use authone_authz::engine::ResourceMapper;
use authone_authz::types::{Account, Group, Permission, PermissionName, Role, Snapshot};
use authone_authz::{
    AccessRequest, BindingSynchronizer, DecisionEngine, InMemoryRepository, RuleStore,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// `accounts` accounts in t1 spread over 10 roles and 5 groups
fn create_snapshot(accounts: usize) -> Snapshot {
    let permissions: Vec<Permission> = (0..20)
        .map(|i| Permission {
            id: format!("p-{}", i),
            name: PermissionName::parse(&format!("doc:action{}", i)).unwrap(),
            description: String::new(),
        })
        .collect();

    let roles: Vec<Role> = (0..10)
        .map(|i| {
            let mut role = Role::new("t1", format!("role-{}", i));
            role.id = format!("role-{}", i);
            role.permission_ids.insert(format!("p-{}", i));
            role.permission_ids.insert(format!("p-{}", i + 10));
            role
        })
        .collect();

    let groups: Vec<Group> = (0..5)
        .map(|i| {
            let mut group = Group::new("t1", format!("group-{}", i));
            group.id = format!("group-{}", i);
            group.role_ids.insert(format!("role-{}", i * 2));
            group
        })
        .collect();

    let accounts = (0..accounts)
        .map(|i| {
            let mut account = Account::new("t1", format!("user-{}", i), format!("user-{}@example.com", i));
            account.id = format!("user-{}", i);
            account.role_ids.insert(format!("role-{}", i % 10));
            account.group_ids.insert(format!("group-{}", i % 5));
            account
        })
        .collect();

    Snapshot {
        permissions,
        roles,
        groups,
        accounts,
        ..Default::default()
    }
}

fn create_engine(rt: &Runtime, accounts: usize, cache: CacheConfig) -> DecisionEngine {
    let store = Arc::new(RuleStore::with_cache(cache));
    rt.block_on(store.rebuild(&create_snapshot(accounts))).unwrap();

    let paths = BTreeMap::from([("doc".to_string(), "/docs/".to_string())]);
    DecisionEngine::new(store).with_resources(ResourceMapper::new(&paths))
}

fn bench_check(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("check");

    for accounts in [100, 1_000, 10_000] {
        let uncached = create_engine(&rt, accounts, CacheConfig { enabled: false, ..Default::default() });
        let cached = create_engine(&rt, accounts, CacheConfig::default());
        let request = AccessRequest::new("user-42", "t1", "/docs/report", "action2");

        group.bench_with_input(BenchmarkId::new("uncached", accounts), &request, |b, request| {
            b.iter(|| black_box(uncached.check(black_box(request)).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("cached", accounts), &request, |b, request| {
            b.iter(|| black_box(cached.check(black_box(request)).unwrap()));
        });
    }

    group.finish();
}

fn bench_bind(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("bind");

    for accounts in [100, 1_000, 10_000] {
        let repo = Arc::new(InMemoryRepository::from_snapshot(create_snapshot(accounts)));
        let store = Arc::new(RuleStore::with_cache(CacheConfig::default()));
        let sync = BindingSynchronizer::new(repo, store);
        rt.block_on(sync.rebuild()).unwrap();

        group.bench_function(BenchmarkId::new("bind_unbind_account_role", accounts), |b| {
            b.to_async(&rt).iter(|| async {
                sync.bind_role_to_account("user-1", "role-9").await.unwrap();
                sync.unbind_role_from_account("user-1", "role-9").await.unwrap();
            });
        });
    }

    group.finish();
}

fn bench_rebuild(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("rebuild");
    group.sample_size(20);

    for accounts in [1_000, 10_000] {
        let snapshot = create_snapshot(accounts);
        let store = RuleStore::with_cache(CacheConfig::default());

        group.bench_with_input(BenchmarkId::new("accounts", accounts), &snapshot, |b, snapshot| {
            b.to_async(&rt).iter(|| async { black_box(store.rebuild(snapshot).await.unwrap()) });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_check, bench_bind, bench_rebuild);
criterion_main!(benches);
