//! services/gateway/src/error.rs
//!
//! Defines the error types for the gateway service: `ApiError` for process
//! startup, `GatewayError` for everything that can go wrong while mediating a
//! single request.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use study_gateway_core::{AdaptError, UpstreamError};
use tracing::{error, info, warn};

use crate::config::ConfigError;
use crate::web::auth::VerificationError;
use crate::web::protocol::ErrorBody;

/// The primary error type for the gateway binary.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents a failure to construct the upstream HTTP client.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

//=========================================================================================
// Request Errors
//=========================================================================================

/// Every way a mediated request can fail. Each variant becomes exactly one
/// `{ "error": ... }` response; the detailed cause only goes to the log.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("credential rejected: {0}")]
    Credential(#[from] VerificationError),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("request body exceeds the size limit")]
    PayloadTooLarge,

    #[error("upstream call failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("upstream plan could not be adapted: {0}")]
    Adapt(#[from] AdaptError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Credential(_) => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Upstream(UpstreamError::NotFound) => StatusCode::NOT_FOUND,
            Self::Upstream(UpstreamError::Unauthorized { .. }) => StatusCode::UNAUTHORIZED,
            Self::Upstream(_) | Self::Adapt(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// The message shown to the client. Never includes verification internals
    /// or upstream bodies.
    pub fn client_message(&self) -> String {
        match self {
            Self::Credential(_) => "Unauthorized.".to_string(),
            Self::Validation(message) => message.clone(),
            Self::PayloadTooLarge => "Request body is too large.".to_string(),
            Self::Upstream(err) => match err {
                UpstreamError::Unreachable(_) => "Upstream service unavailable.",
                UpstreamError::Timeout(_) => "Upstream service timed out.",
                UpstreamError::UpstreamServerError { .. } => "Upstream service failed.",
                UpstreamError::NotFound => "Requested resource not found upstream.",
                UpstreamError::Unauthorized { .. } => "Upstream rejected the request.",
                UpstreamError::UnexpectedStatus { .. } => "Unexpected upstream response.",
                UpstreamError::MalformedResponse(_) => "Upstream returned an invalid response.",
            }
            .to_string(),
            Self::Adapt(_) => "Upstream returned an invalid response.".to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match &self {
            Self::Credential(e) => warn!("Rejected credential: {}", e),
            Self::Validation(e) => info!("Rejected request: {}", e),
            Self::PayloadTooLarge => info!("Rejected oversized request body"),
            Self::Upstream(e) => error!("Upstream failure: {:?}", e),
            Self::Adapt(e) => error!("Failed to adapt upstream plan: {:?}", e),
        }
        let body = ErrorBody {
            error: self.client_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}
