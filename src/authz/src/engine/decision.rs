//! Access request and decision types

use crate::types::{AccountId, RoleId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A single access check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    /// Account attempting the action
    pub account_id: AccountId,

    /// Tenant the check is evaluated in
    #[serde(default)]
    pub tenant_id: Option<TenantId>,

    /// Resource path or permission resource name (e.g. `/docs/1`, `doc`)
    pub resource: String,

    /// Action name (e.g. `read`)
    pub action: String,
}

impl AccessRequest {
    pub fn new(
        account_id: impl Into<AccountId>,
        tenant_id: impl Into<TenantId>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            tenant_id: Some(tenant_id.into()),
            resource: resource.into(),
            action: action.into(),
        }
    }

    /// Same request without a tenant
    pub fn without_tenant(mut self) -> Self {
        self.tenant_id = None;
        self
    }
}

/// Why a check was allowed or denied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecisionReason {
    /// The request carried no tenant
    NoTenant,

    /// The account is not known to the rule store
    UnknownAccount,

    /// No role of the account belongs to the requested tenant
    NoEffectiveRoles,

    /// An effective role grants the requested permission
    Granted { role_id: RoleId },

    /// Effective roles exist but none grants the permission
    NotGranted { permission: String },
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionReason::NoTenant => write!(f, "no tenant"),
            DecisionReason::UnknownAccount => write!(f, "unknown account"),
            DecisionReason::NoEffectiveRoles => write!(f, "no effective roles in tenant"),
            DecisionReason::Granted { role_id } => write!(f, "granted by role {}", role_id),
            DecisionReason::NotGranted { permission } => {
                write!(f, "permission {} not granted", permission)
            }
        }
    }
}

/// Verdict of an access check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessDecision {
    /// Unique decision ID
    pub id: String,

    pub allowed: bool,

    pub reason: DecisionReason,

    /// Role that granted the permission, when allowed
    pub granted_by: Option<RoleId>,

    /// Effective roles of the account in the requested tenant
    pub effective_roles: Vec<RoleId>,

    pub timestamp: DateTime<Utc>,
}

impl AccessDecision {
    /// Create an allow decision
    pub fn allow(role_id: RoleId, effective_roles: Vec<RoleId>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            allowed: true,
            reason: DecisionReason::Granted { role_id: role_id.clone() },
            granted_by: Some(role_id),
            effective_roles,
            timestamp: Utc::now(),
        }
    }

    /// Create a deny decision
    pub fn deny(reason: DecisionReason, effective_roles: Vec<RoleId>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            allowed: false,
            reason,
            granted_by: None,
            effective_roles,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_messages() {
        assert_eq!(DecisionReason::NoTenant.to_string(), "no tenant");
        assert_eq!(DecisionReason::UnknownAccount.to_string(), "unknown account");
        assert_eq!(
            DecisionReason::NoEffectiveRoles.to_string(),
            "no effective roles in tenant"
        );
        assert_eq!(
            DecisionReason::Granted { role_id: "reader".into() }.to_string(),
            "granted by role reader"
        );
        assert_eq!(
            DecisionReason::NotGranted { permission: "doc:write".into() }.to_string(),
            "permission doc:write not granted"
        );
    }

    #[test]
    fn test_allow_carries_granting_role() {
        let decision = AccessDecision::allow("editor".into(), vec!["editor".into()]);
        assert!(decision.allowed);
        assert_eq!(decision.granted_by.as_deref(), Some("editor"));
    }

    #[test]
    fn test_request_tenant_is_optional_on_the_wire() {
        let request: AccessRequest = serde_json::from_str(
            r#"{"account_id": "alice", "resource": "doc", "action": "read"}"#,
        )
        .unwrap();
        assert!(request.tenant_id.is_none());
    }
}
