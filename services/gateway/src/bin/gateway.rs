//! services/gateway/src/bin/gateway.rs

use axum::Router;
use gateway_lib::{
    adapters::BrainClient,
    config::Config,
    error::ApiError,
    web::{self, rest::ApiDoc, state::AppState},
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting gateway...");
    if !config.auth_enabled {
        warn!("Authentication is DISABLED; clients must send studentId themselves");
    }

    // --- 2. Initialize the Knowledge Engine Client ---
    let brain = Arc::new(BrainClient::new(&config)?);
    info!(
        "Knowledge engine at {} (plan timeout {:?}, review timeout {:?})",
        config.brain_api_url, config.plan_timeout, config.review_timeout
    );

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(config.clone(), brain));

    // --- 4. Create the Web Router ---
    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(web::router(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
