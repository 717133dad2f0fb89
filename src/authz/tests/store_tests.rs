//! Rule Store tests: snapshot atomicity, cancellation and convergence

mod common;

use authone_authz::types::{EdgeKind, Snapshot};
use authone_authz::{AuthzError, EntityRepository, RuleStore};
use common::{account, permission, role, world};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// `n` accounts in t1, all holding `role_id`
fn snapshot_granting(role_id: &str, n: usize) -> Snapshot {
    let mut reader = role("reader", "t1");
    reader.permission_ids.insert("p-read".into());
    let mut editor = role("editor", "t1");
    editor.permission_ids.extend(["p-read".to_string(), "p-write".to_string()]);

    let accounts = (0..n)
        .map(|i| {
            let mut a = account(&format!("user-{}", i), "t1");
            a.role_ids.insert(role_id.to_string());
            a
        })
        .collect();

    Snapshot {
        permissions: vec![permission("p-read", "doc:read"), permission("p-write", "doc:write")],
        roles: vec![reader, editor],
        accounts,
        ..Default::default()
    }
}

// ============================================================================
// REBUILD
// ============================================================================

#[tokio::test]
async fn test_rebuild_counts_and_versions() {
    let store = RuleStore::new();
    let stats = store.rebuild(&snapshot_granting("reader", 10)).await.unwrap();

    assert_eq!(stats.roles, 2);
    assert_eq!(stats.accounts, 10);
    // 3 role-permission edges + 10 account-role edges
    assert_eq!(stats.edges, 13);
    assert_eq!(stats.skipped, 0);
    assert_eq!(stats.version, 1);
    assert_eq!(store.version(), 1);
}

#[tokio::test]
async fn test_rebuild_skips_dangling_references() {
    let mut snapshot = snapshot_granting("reader", 2);
    snapshot.accounts[0].role_ids.insert("ghost".into());
    snapshot.roles[0].permission_ids.insert("p-missing".into());

    let store = RuleStore::new();
    let stats = store.rebuild(&snapshot).await.unwrap();

    assert_eq!(stats.skipped, 2);
    assert!(!store.snapshot().has_edge(EdgeKind::AccountRole, "user-0", "ghost"));
    assert!(store.snapshot().has_edge(EdgeKind::AccountRole, "user-0", "reader"));
}

#[tokio::test]
async fn test_cancelled_rebuild_keeps_previous_rules() {
    let store = RuleStore::new();
    store.rebuild(&snapshot_granting("reader", 4)).await.unwrap();
    let before = store.snapshot();

    let token = CancellationToken::new();
    token.cancel();
    let result = store.rebuild_with_cancel(&snapshot_granting("editor", 4), &token).await;

    assert!(matches!(result, Err(AuthzError::Cancelled(_))));
    assert_eq!(store.version(), before.version());
    assert_eq!(store.snapshot().edges(), before.edges());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_observe_partial_rebuild() {
    const ACCOUNTS: usize = 2_000;

    let store = Arc::new(RuleStore::new());
    store.rebuild(&snapshot_granting("reader", ACCOUNTS)).await.unwrap();

    let token = CancellationToken::new();
    let mut readers = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        let token = token.clone();
        readers.push(tokio::spawn(async move {
            let mut observed = 0usize;
            loop {
                let rules = store.snapshot();
                let first = rules.effective_permissions("user-0", "t1").unwrap();
                let last = rules
                    .effective_permissions(&format!("user-{}", ACCOUNTS - 1), "t1")
                    .unwrap();

                // Either every account is a reader or every account is an editor
                assert_eq!(first.contains("doc:write"), last.contains("doc:write"));
                observed += 1;
                if token.is_cancelled() {
                    break observed;
                }
                tokio::task::yield_now().await;
            }
        }));
    }

    for i in 0..6 {
        let granted = if i % 2 == 0 { "editor" } else { "reader" };
        store.rebuild(&snapshot_granting(granted, ACCOUNTS)).await.unwrap();
    }
    token.cancel();

    for reader in readers {
        assert!(reader.await.unwrap() > 0);
    }
    assert_eq!(store.version(), 7);
}

// ============================================================================
// CONVERGENCE
// ============================================================================

#[tokio::test]
async fn test_rebuild_matches_incremental_state() {
    let w = world().await;
    w.sync.bind_role_to_group("dev-team", "reader").await.unwrap();
    w.sync.bind_group_to_account("carol", "dev-team").await.unwrap();
    w.sync.unbind_role_from_account("bob", "editor").await.unwrap();

    let incremental = w.store.snapshot().edges();

    let rebuilt = RuleStore::new();
    rebuilt.rebuild(&w.repo.snapshot().await.unwrap()).await.unwrap();
    assert_eq!(rebuilt.snapshot().edges(), incremental);

    w.sync.rebuild().await.unwrap();
    assert_eq!(w.store.snapshot().edges(), incremental);
}

#[tokio::test]
async fn test_bind_order_does_not_matter() {
    let forward = world().await;
    forward.sync.bind_role_to_group("dev-team", "editor").await.unwrap();
    forward.sync.bind_group_to_account("carol", "dev-team").await.unwrap();

    let backward = world().await;
    backward.sync.bind_group_to_account("carol", "dev-team").await.unwrap();
    backward.sync.bind_role_to_group("dev-team", "editor").await.unwrap();

    assert_eq!(forward.store.snapshot().edges(), backward.store.snapshot().edges());
    assert!(backward.engine.may("carol", "t1", "/docs/1", "write").unwrap());
}

// ============================================================================
// CACHE
// ============================================================================

#[tokio::test]
async fn test_rebuild_invalidates_cache() {
    let w = world().await;
    assert!(w.engine.may("alice", "t1", "/docs/1", "read").unwrap());
    assert!(w.store.is_cached("alice", "t1"));

    w.repo.unlink(EdgeKind::AccountRole, "alice", "reader").await.unwrap();
    // Repository changed behind the store's back; the cache still answers
    assert!(w.engine.may("alice", "t1", "/docs/1", "read").unwrap());

    w.sync.rebuild().await.unwrap();
    assert!(!w.store.is_cached("alice", "t1"));
    assert!(!w.engine.may("alice", "t1", "/docs/1", "read").unwrap());
}

#[tokio::test]
async fn test_unrelated_bind_keeps_other_entries() {
    let w = world().await;
    w.engine.may("alice", "t1", "/docs/1", "read").unwrap();
    w.engine.may("bob", "t1", "/docs/1", "read").unwrap();

    w.sync.bind_role_to_account("bob", "reader").await.unwrap();

    assert!(w.store.is_cached("alice", "t1"));
    assert!(!w.store.is_cached("bob", "t1"));
}
