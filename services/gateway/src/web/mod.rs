pub mod auth;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

// Re-export the handlers to make them easily accessible
// to the binary that builds the web server.
pub use middleware::{log_requests, require_auth};
pub use rest::{generate_plan_handler, health_handler, missing_node_handler, review_handler};
use state::AppState;

/// Request bodies larger than this are rejected before reaching a handler.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Builds the gateway's API router.
pub fn router(app_state: Arc<AppState>) -> Router {
    let cors = match &app_state.config.cors_origin {
        Some(origin) => CorsLayer::new().allow_origin(origin.clone()),
        None => CorsLayer::new().allow_origin(Any),
    }
    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
    .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new().route("/health", get(health_handler));

    // Protected routes (auth required when enabled). The `/api/study/...`
    // paths are the ones older clients call.
    let protected_routes = Router::new()
        .route("/study/generate", post(generate_plan_handler))
        .route("/study/review", post(missing_node_handler))
        .route("/study/review/", post(missing_node_handler))
        .route("/study/review/{node_id}", post(review_handler))
        .route("/api/study/generate-plan", post(generate_plan_handler))
        .route("/api/study/review/{node_id}", post(review_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(axum_middleware::from_fn(log_requests))
        .with_state(app_state)
}
