//! services/gateway/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::GatewayError;
use crate::mediator;
use crate::web::protocol::{ErrorBody, GeneratePlanRequest, HealthResponse, ReviewRequest};
use crate::web::state::AppState;
use axum::{
    extract::{
        rejection::{BytesRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::Json,
    Extension,
};
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use study_gateway_core::{FlatStudyItem, StudyPlanResponse, SubjectId};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

pub const SERVICE_NAME: &str = "study-gateway";

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        generate_plan_handler,
        review_handler,
        health_handler,
    ),
    components(
        schemas(
            StudyPlanResponse,
            FlatStudyItem,
            GeneratePlanRequest,
            ReviewRequest,
            ErrorBody,
            HealthResponse
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Study Gateway API", description = "Authenticated access to study plans and reviews.")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Generate a study plan for the authenticated student.
///
/// The plan is produced by the knowledge engine and flattened into one list of
/// study items. An engine plan with no items yields an empty list, not an error.
#[utoipa::path(
    post,
    path = "/study/generate",
    request_body = GeneratePlanRequest,
    responses(
        (status = 200, description = "Normalized study plan", body = StudyPlanResponse),
        (status = 400, description = "Malformed body, or missing studentId while auth is disabled", body = ErrorBody),
        (status = 401, description = "Missing, malformed or expired credential", body = ErrorBody),
        (status = 413, description = "Request body larger than 1 MiB", body = ErrorBody),
        (status = 404, description = "The engine does not know this student", body = ErrorBody),
        (status = 502, description = "Engine unavailable, timed out or returned an invalid plan", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn generate_plan_handler(
    State(state): State<Arc<AppState>>,
    verified: Option<Extension<SubjectId>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<StudyPlanResponse>, GatewayError> {
    let request: GeneratePlanRequest = parse_body(&body.map_err(body_rejection)?)?;
    let subject = mediator::resolve_subject(
        state.verifier.is_some(),
        verified.map(|Extension(subject)| subject),
        request.student_id.as_deref(),
    )?;

    let plan = mediator::generate_plan(state.engine.as_ref(), &subject, Utc::now()).await?;
    Ok(Json(plan))
}

/// Submit a review for one knowledge node.
///
/// `success` is derived from `grade` by the gateway; a client-supplied value
/// is ignored. The engine's acknowledgement is returned unchanged.
#[utoipa::path(
    post,
    path = "/study/review/{node_id}",
    request_body = ReviewRequest,
    params(
        ("node_id" = String, Path, description = "The knowledge node being reviewed.")
    ),
    responses(
        (status = 200, description = "Acknowledgement from the knowledge engine, passed through"),
        (status = 400, description = "Missing or undecodable nodeId, missing or invalid grade", body = ErrorBody),
        (status = 401, description = "Missing, malformed or expired credential", body = ErrorBody),
        (status = 413, description = "Request body larger than 1 MiB", body = ErrorBody),
        (status = 404, description = "The engine does not know this node", body = ErrorBody),
        (status = 502, description = "Engine unavailable or timed out", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn review_handler(
    State(state): State<Arc<AppState>>,
    node_id: Result<Path<String>, PathRejection>,
    verified: Option<Extension<SubjectId>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Value>, GatewayError> {
    let Path(node_id) = node_id.map_err(|e| {
        GatewayError::Validation(format!("nodeId is not a valid path segment: {}", e.body_text()))
    })?;
    let request: ReviewRequest = parse_body(&body.map_err(body_rejection)?)?;
    let subject = mediator::resolve_subject(
        state.verifier.is_some(),
        verified.map(|Extension(subject)| subject),
        request.student_id.as_deref(),
    )?;

    let ack = mediator::submit_review(state.engine.as_ref(), &subject, &node_id, &request).await?;
    Ok(Json(ack))
}

/// Catches review calls whose path has no node id.
pub async fn missing_node_handler() -> GatewayError {
    GatewayError::Validation("nodeId is required".to_string())
}

/// Liveness probe. Always answers 200.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "The gateway is running", body = HealthResponse)
    )
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP".to_string(),
        service: SERVICE_NAME.to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

fn body_rejection(rejection: BytesRejection) -> GatewayError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        GatewayError::PayloadTooLarge
    } else {
        GatewayError::Validation(format!("Request body could not be read: {}", rejection.body_text()))
    }
}

/// Parses an optional JSON body; an empty body reads as `{}`.
fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, GatewayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| GatewayError::Validation(format!("Request body is not valid JSON: {e}")))
}
