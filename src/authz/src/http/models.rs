//! Request and response bodies of the Access API

use crate::engine::{AccessDecision, AccessRequest};
use serde::{Deserialize, Serialize};

/// `POST /v1/check` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    pub account_id: String,

    #[serde(default)]
    pub tenant_id: Option<String>,

    pub resource: String,
    pub action: String,
}

impl From<CheckRequest> for AccessRequest {
    fn from(req: CheckRequest) -> Self {
        AccessRequest {
            account_id: req.account_id,
            tenant_id: req.tenant_id,
            resource: req.resource,
            action: req.action,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub allowed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub granted_by: Option<String>,

    pub decision_id: String,
}

impl From<AccessDecision> for CheckResponse {
    fn from(decision: AccessDecision) -> Self {
        CheckResponse {
            allowed: decision.allowed,
            reason: Some(decision.reason.to_string()),
            granted_by: decision.granted_by,
            decision_id: decision.id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub version: String,

    /// Version of the published rule set
    pub rule_version: u64,
}
