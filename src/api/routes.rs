//! API route definitions

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, ServiceState};

/// Create the trigger and status routes
pub fn api_routes(state: ServiceState) -> Router {
    Router::new()
        .route("/run", post(handlers::trigger_run))
        .route("/status", get(handlers::get_status))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Scheduler, SchedulerOptions};
    use crate::storage::InMemoryStore;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_test_state() -> ServiceState {
        let store = Arc::new(InMemoryStore::new());
        ServiceState::new(Scheduler::new(store, SchedulerOptions::default()))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_status_idle_at_startup() {
        let app = api_routes(create_test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({"status": "idle"}));
    }

    #[tokio::test]
    async fn test_run_while_processing() {
        let state = create_test_state();
        let _guard = state.controller.try_begin().unwrap();
        let app = api_routes(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/run")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"status": "processing"})
        );
    }

    #[tokio::test]
    async fn test_run_requires_post() {
        let app = api_routes(create_test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/run")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
