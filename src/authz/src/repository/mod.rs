//! Entity repository: the source of truth the synchronizer writes through
//! and the rebuild path reads from

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryRepository;
#[cfg(feature = "postgres")]
pub use postgres::PostgresRepository;

use crate::error::Result;
use crate::types::{Account, EdgeKind, Group, Permission, Resource, Role, Snapshot};
use async_trait::async_trait;

/// Entity storage trait
///
/// Relationship sets live on the `from` side of each [`EdgeKind`]:
/// `Role::permission_ids`, `Account::role_ids`, `Group::role_ids` and
/// `Account::group_ids`.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    async fn get_permission(&self, id: &str) -> Result<Option<Permission>>;
    async fn get_role(&self, id: &str) -> Result<Option<Role>>;
    async fn get_group(&self, id: &str) -> Result<Option<Group>>;
    async fn get_account(&self, id: &str) -> Result<Option<Account>>;
    async fn get_resource(&self, id: &str) -> Result<Option<Resource>>;

    /// Insert or replace, including relationship sets
    async fn insert_permission(&self, permission: Permission) -> Result<()>;
    async fn insert_role(&self, role: Role) -> Result<()>;
    async fn insert_group(&self, group: Group) -> Result<()>;
    async fn insert_account(&self, account: Account) -> Result<()>;
    async fn insert_resource(&self, resource: Resource) -> Result<()>;

    /// Add a relationship; `Ok(false)` if it already existed
    ///
    /// Fails with `NotFound` when either entity does not exist.
    async fn link(&self, kind: EdgeKind, from: &str, to: &str) -> Result<bool>;

    /// Remove a relationship; `Ok(false)` if it did not exist
    async fn unlink(&self, kind: EdgeKind, from: &str, to: &str) -> Result<bool>;

    /// Delete an entity and every relationship referring to it;
    /// `Ok(false)` if it did not exist
    async fn delete_permission(&self, id: &str) -> Result<bool>;
    async fn delete_role(&self, id: &str) -> Result<bool>;
    async fn delete_group(&self, id: &str) -> Result<bool>;
    async fn delete_account(&self, id: &str) -> Result<bool>;

    /// Full read of every entity, ordered by id
    async fn snapshot(&self) -> Result<Snapshot>;
}
