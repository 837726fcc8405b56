//! services/gateway/src/web/protocol.rs
//!
//! Defines the JSON bodies exchanged between the study client and the gateway.
//! The study plan itself is defined in the core crate.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

//=========================================================================================
// Bodies Sent FROM the Client TO the Gateway
//=========================================================================================

/// Body of `POST /study/generate`. Usually `{}`.
#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct GeneratePlanRequest {
    /// Only read when authentication is disabled; otherwise the credential's
    /// subject is used and this field is ignored.
    #[serde(default, alias = "studentId")]
    pub student_id: Option<String>,
}

/// Body of `POST /study/review/{nodeId}`.
///
/// `grade` stays an untyped JSON value so that a missing, non-numeric or
/// out-of-range grade is reported with one consistent 400 message.
#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct ReviewRequest {
    #[serde(default)]
    #[schema(value_type = Option<u8>, minimum = 1, maximum = 4)]
    pub grade: Option<Value>,
    #[serde(default, alias = "responseTimeSeconds")]
    pub response_time_seconds: Option<f64>,
    /// Only read when authentication is disabled.
    #[serde(default, alias = "studentId")]
    pub student_id: Option<String>,
}

//=========================================================================================
// Bodies Sent FROM the Gateway TO the Client
//=========================================================================================

/// The body of every error response.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub timestamp: String,
}
