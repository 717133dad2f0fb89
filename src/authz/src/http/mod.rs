//! Access API: HTTP boundary over the decision engine and synchronizer
//!
//! Wire types live in [`models`] and are kept apart from the core data model.

pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_metrics_router, create_router};
pub use state::AppState;
