//! Route definitions for the Access API

use super::{handlers, state::AppState};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Access API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO));

    let api_routes = Router::new()
        .route("/check", post(handlers::check_access))
        .route(
            "/roles/:role_id/permissions/:permission_id",
            post(handlers::bind_permission_to_role).delete(handlers::unbind_permission_from_role),
        )
        .route(
            "/accounts/:account_id/roles/:role_id",
            post(handlers::bind_role_to_account).delete(handlers::unbind_role_from_account),
        )
        .route(
            "/groups/:group_id/roles/:role_id",
            post(handlers::bind_role_to_group).delete(handlers::unbind_role_from_group),
        )
        .route(
            "/accounts/:account_id/groups/:group_id",
            post(handlers::bind_group_to_account).delete(handlers::unbind_group_from_account),
        )
        .route("/rebuild", post(handlers::rebuild));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_routes)
        .with_state(state)
        .layer(ServiceBuilder::new().layer(trace).layer(cors))
}

/// Metrics router, served on its own port
pub fn create_metrics_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
}
