//! Request handlers for the Access API

use super::error::{ApiError, Result};
use super::models::{CheckRequest, CheckResponse, HealthResponse};
use super::state::AppState;
use crate::store::RebuildStats;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::info;

/// POST /v1/check
pub async fn check_access(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<CheckRequest>, JsonRejection>,
) -> Result<Json<CheckResponse>> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let decision = state.engine.check(&req.into())?;
    Ok(Json(decision.into()))
}

/// POST /v1/roles/:role_id/permissions/:permission_id
pub async fn bind_permission_to_role(
    State(state): State<Arc<AppState>>,
    Path((role_id, permission_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    state.sync.bind_permission_to_role(&role_id, &permission_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/roles/:role_id/permissions/:permission_id
pub async fn unbind_permission_from_role(
    State(state): State<Arc<AppState>>,
    Path((role_id, permission_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    state.sync.unbind_permission_from_role(&role_id, &permission_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/accounts/:account_id/roles/:role_id
pub async fn bind_role_to_account(
    State(state): State<Arc<AppState>>,
    Path((account_id, role_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    state.sync.bind_role_to_account(&account_id, &role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/accounts/:account_id/roles/:role_id
pub async fn unbind_role_from_account(
    State(state): State<Arc<AppState>>,
    Path((account_id, role_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    state.sync.unbind_role_from_account(&account_id, &role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/groups/:group_id/roles/:role_id
pub async fn bind_role_to_group(
    State(state): State<Arc<AppState>>,
    Path((group_id, role_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    state.sync.bind_role_to_group(&group_id, &role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/groups/:group_id/roles/:role_id
pub async fn unbind_role_from_group(
    State(state): State<Arc<AppState>>,
    Path((group_id, role_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    state.sync.unbind_role_from_group(&group_id, &role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/accounts/:account_id/groups/:group_id
pub async fn bind_group_to_account(
    State(state): State<Arc<AppState>>,
    Path((account_id, group_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    state.sync.bind_group_to_account(&account_id, &group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/accounts/:account_id/groups/:group_id
pub async fn unbind_group_from_account(
    State(state): State<Arc<AppState>>,
    Path((account_id, group_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    state.sync.unbind_group_from_account(&account_id, &group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/rebuild
pub async fn rebuild(State(state): State<Arc<AppState>>) -> Result<Json<RebuildStats>> {
    let stats = state.sync.rebuild().await?;
    info!("Rebuild requested over HTTP: version={}", stats.version);
    Ok(Json(stats))
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        version: crate::VERSION.to_string(),
        rule_version: state.engine.store().version(),
    })
}

/// Prometheus text exposition
struct MetricsResponse {
    metrics: String,
}

impl IntoResponse for MetricsResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            self.metrics,
        )
            .into_response()
    }
}

/// GET /metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = state.engine.store();
    let mut metrics = state.engine.metrics().export_prometheus();

    metrics.push_str(&format!(
        "\n# HELP authz_rule_version Version of the published rule set\n\
         # TYPE authz_rule_version gauge\n\
         authz_rule_version {}\n",
        store.version()
    ));

    if let Some(cache) = store.cache_stats() {
        metrics.push_str(&format!(
            "\n# HELP authz_cache_entries Cached effective-permission entries\n\
             # TYPE authz_cache_entries gauge\n\
             authz_cache_entries {}\n",
            cache.entries
        ));
    }

    metrics.push_str(&format!(
        "\n# HELP authz_uptime_seconds Server uptime in seconds\n\
         # TYPE authz_uptime_seconds gauge\n\
         authz_uptime_seconds {}\n",
        state.start_time.elapsed().as_secs()
    ));

    MetricsResponse { metrics }
}
