//! Core data model: identifiers, permission names, entities and edges

use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique permission identifier
pub type PermissionId = String;

/// Unique role identifier
pub type RoleId = String;

/// Unique group identifier
pub type GroupId = String;

/// Unique account identifier
pub type AccountId = String;

/// Unique resource identifier
pub type ResourceId = String;

/// Tenant identifier
pub type TenantId = String;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Permission name of the form `resource:action`
///
/// Exactly two non-empty segments joined by a single colon. Names are
/// case-sensitive and compared verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionName(String);

impl PermissionName {
    /// Parse and validate a permission name
    pub fn parse(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let mut parts = name.split(':');
        let (resource, action) = match (parts.next(), parts.next(), parts.next()) {
            (Some(resource), Some(action), None) => (resource, action),
            _ => {
                return Err(AuthzError::Validation(format!(
                    "permission must be 'resource:action', got {:?}",
                    name
                )))
            }
        };

        if resource.is_empty() || action.is_empty() {
            return Err(AuthzError::Validation(format!("invalid permission: {:?}", name)));
        }

        Ok(Self(name))
    }

    /// Build a permission name from its two segments
    pub fn from_parts(resource: &str, action: &str) -> Result<Self> {
        Self::parse(format!("{}:{}", resource, action))
    }

    /// The resource segment
    pub fn resource(&self) -> &str {
        self.split().0
    }

    /// The action segment
    pub fn action(&self) -> &str {
        self.split().1
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn split(&self) -> (&str, &str) {
        // Validated on construction: exactly one colon.
        self.0.split_once(':').unwrap_or((self.0.as_str(), ""))
    }
}

impl fmt::Display for PermissionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PermissionName {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PermissionName {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<PermissionName> for String {
    fn from(name: PermissionName) -> Self {
        name.0
    }
}

impl AsRef<str> for PermissionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Permission entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,

    /// `resource:action` name
    pub name: PermissionName,

    #[serde(default)]
    pub description: String,
}

impl Permission {
    /// Create a permission with a fresh identifier
    pub fn new(name: &str, description: impl Into<String>) -> Result<Self> {
        Ok(Self {
            id: new_id(),
            name: PermissionName::parse(name)?,
            description: description.into(),
        })
    }
}

/// Role entity, owned by a tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub tenant_id: TenantId,
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Permissions granted by this role
    #[serde(default)]
    pub permission_ids: BTreeSet<PermissionId>,
}

impl Role {
    /// Create a role with a fresh identifier
    pub fn new(tenant_id: impl Into<TenantId>, name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            tenant_id: tenant_id.into(),
            name: name.into(),
            description: String::new(),
            permission_ids: BTreeSet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Group entity, owned by a tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub tenant_id: TenantId,
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Roles inherited by every member
    #[serde(default)]
    pub role_ids: BTreeSet<RoleId>,
}

impl Group {
    /// Create a group with a fresh identifier
    pub fn new(tenant_id: impl Into<TenantId>, name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            tenant_id: tenant_id.into(),
            name: name.into(),
            description: String::new(),
            role_ids: BTreeSet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Account entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub tenant_id: TenantId,
    pub username: String,
    pub email: String,

    /// Direct role grants
    #[serde(default)]
    pub role_ids: BTreeSet<RoleId>,

    /// Group memberships
    #[serde(default)]
    pub group_ids: BTreeSet<GroupId>,
}

impl Account {
    /// Create an account with a fresh identifier
    pub fn new(
        tenant_id: impl Into<TenantId>,
        username: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            tenant_id: tenant_id.into(),
            username: username.into(),
            email: email.into(),
            role_ids: BTreeSet::new(),
            group_ids: BTreeSet::new(),
        }
    }
}

/// Resource entity
///
/// The decision engine does not consult it: check requests carry an opaque
/// resource string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,

    /// Resource type (document, app, ...)
    #[serde(rename = "type")]
    pub resource_type: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<AccountId>,
}

impl Resource {
    /// Create a resource with a fresh identifier
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            tenant_id: None,
            resource_type: resource_type.into(),
            name: name.into(),
            owner_id: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<TenantId>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<AccountId>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }
}

/// Kind of entity participating in a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Permission,
    Role,
    Group,
    Account,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Permission => "permission",
            NodeKind::Role => "role",
            NodeKind::Group => "group",
            NodeKind::Account => "account",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four many-to-many binding edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// role → permission
    RolePermission,
    /// account → role (direct grant)
    AccountRole,
    /// group → role
    GroupRole,
    /// account → group (membership)
    AccountGroup,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 4] = [
        EdgeKind::RolePermission,
        EdgeKind::AccountRole,
        EdgeKind::GroupRole,
        EdgeKind::AccountGroup,
    ];

    /// `(from, to)` node kinds of this edge
    pub fn endpoints(&self) -> (NodeKind, NodeKind) {
        match self {
            EdgeKind::RolePermission => (NodeKind::Role, NodeKind::Permission),
            EdgeKind::AccountRole => (NodeKind::Account, NodeKind::Role),
            EdgeKind::GroupRole => (NodeKind::Group, NodeKind::Role),
            EdgeKind::AccountGroup => (NodeKind::Account, NodeKind::Group),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::RolePermission => "role_permission",
            EdgeKind::AccountRole => "account_role",
            EdgeKind::GroupRole => "group_role",
            EdgeKind::AccountGroup => "account_group",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full read of the entity repository
///
/// Consumed by rebuilds and used as the seed file format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub permissions: Vec<Permission>,

    #[serde(default)]
    pub roles: Vec<Role>,

    #[serde(default)]
    pub groups: Vec<Group>,

    #[serde(default)]
    pub accounts: Vec<Account>,

    #[serde(default)]
    pub resources: Vec<Resource>,

    /// Records the repository could not read and left out
    #[serde(skip)]
    pub skipped: usize,
}

impl Snapshot {
    /// Total number of entity records
    pub fn len(&self) -> usize {
        self.permissions.len()
            + self.roles.len()
            + self.groups.len()
            + self.accounts.len()
            + self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
