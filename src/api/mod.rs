//! REST API module using Axum
//!
//! The service-mode trigger surface:
//! - `POST /run` - start an analysis pass unless one is running
//! - `GET /status` - current run state
//!
//! Responses only ever carry the coarse run state, never per-batch detail.

mod handlers;
mod routes;

pub use handlers::{RunResponse, ServiceState, StatusResponse};
pub use routes::api_routes;

use axum::Router;
use tower_http::trace::TraceLayer;

/// Create the complete application router.
pub fn create_app(state: ServiceState) -> Router {
    api_routes(state).layer(TraceLayer::new_for_http())
}
