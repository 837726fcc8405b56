//! services/gateway/src/web/middleware.rs
//!
//! Authentication and access-log middleware.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::GatewayError;
use crate::web::auth::VerificationError;
use crate::web::state::AppState;

/// Middleware that validates the bearer credential and extracts the subject id.
///
/// If valid, inserts the `SubjectId` into request extensions for handlers to use.
/// If invalid or missing, answers 401 without reaching the handler, so no
/// upstream call is ever made for an unauthenticated request.
/// When authentication is disabled the request passes through untouched.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let Some(verifier) = state.verifier.as_ref() else {
        return Ok(next.run(req).await);
    };

    // 1. Extract the Authorization header
    let raw_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .map(|v| v.to_str().map_err(|_| VerificationError::MalformedCredential))
        .transpose()?;

    // 2. Verify it against the server-held secret
    let subject = verifier.verify(raw_header, Utc::now())?;
    debug!(subject = %subject, "Request authenticated");

    // 3. Insert the subject into request extensions
    req.extensions_mut().insert(subject);

    // 4. Continue to the handler
    Ok(next.run(req).await)
}

/// Logs one line per request with its status and latency.
pub async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    info!(
        "{} {} {} - {}ms",
        method,
        path,
        response.status().as_u16(),
        start.elapsed().as_millis()
    );
    response
}
