//! # AuthOne Authorization Core
//!
//! Multi-tenant RBAC with group inheritance: decides whether an account may
//! perform an action on a resource inside a tenant.
//!
//! ## Components
//!
//! - **Rule Store** ([`store`]): tenant-tagged nodes and binding edges behind
//!   lock-free copy-on-write snapshots, with a versioned permission cache
//! - **Binding Synchronizer** ([`sync`]): idempotent bind/unbind/delete
//!   through an [`EntityRepository`], plus cancellable full rebuilds
//! - **Decision Engine** ([`engine`]): the `check` predicate with tenant
//!   isolation, metrics and audit
//! - **Access API** ([`http`]): axum routes served by `authone-server`
//!
//! ## Example
//!
//! ```rust
//! use authone_authz::{
//!     AccessRequest, BindingSynchronizer, DecisionEngine, EntityRepository,
//!     InMemoryRepository, Permission, Role, RuleStore,
//! };
//! use authone_authz::types::Account;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = Arc::new(InMemoryRepository::new());
//!     let read = Permission::new("doc:read", "Read documents")?;
//!     let reader = Role::new("t1", "reader");
//!     let alice = Account::new("t1", "alice", "alice@example.com");
//!
//!     repo.insert_permission(read.clone()).await?;
//!     repo.insert_role(reader.clone()).await?;
//!     repo.insert_account(alice.clone()).await?;
//!
//!     let store = Arc::new(RuleStore::new());
//!     let sync = BindingSynchronizer::new(repo, store.clone());
//!     sync.bind_permission_to_role(&reader.id, &read.id).await?;
//!     sync.bind_role_to_account(&alice.id, &reader.id).await?;
//!
//!     let engine = DecisionEngine::new(store);
//!     let decision = engine.check(&AccessRequest::new(&alice.id, "t1", "doc", "read"))?;
//!     assert!(decision.allowed);
//!
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod repository;
pub mod store;
pub mod sync;
pub mod types;

pub use audit::{AuditEntry, AuditKind, AuditLog};
pub use config::AuthzConfig;
pub use engine::{AccessDecision, AccessRequest, DecisionEngine, DecisionReason};
pub use error::{AuthzError, Result};
pub use repository::{EntityRepository, InMemoryRepository};
pub use store::{RebuildStats, RuleStore};
pub use sync::{BindOutcome, BindingSynchronizer};
pub use types::{EdgeKind, Permission, PermissionName, Role};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
