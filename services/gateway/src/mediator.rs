//! services/gateway/src/mediator.rs
//!
//! The request mediator: drives the generate and review flows from an
//! authenticated request to a client response.
//!
//! Generate: RECEIVED -> AUTHENTICATED -> UPSTREAM_CALLED -> ADAPTED -> RESPONDED.
//! Review:   RECEIVED -> AUTHENTICATED -> TRANSFORMED -> UPSTREAM_CALLED -> RESPONDED.
//! Any step may short-circuit to FAILED with a `GatewayError`. Authentication
//! itself happens in `web::middleware::require_auth` before a flow starts.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::fmt;
use study_gateway_core::{
    flatten, to_upstream_review, Grade, KnowledgeEngine, ReviewSubmission, StudyPlanResponse,
    SubjectId,
};
use tracing::debug;

use crate::error::GatewayError;
use crate::web::auth::VerificationError;
use crate::web::protocol::ReviewRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Received,
    Authenticated,
    Transformed,
    UpstreamCalled,
    Adapted,
    Responded,
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "RECEIVED",
            Self::Authenticated => "AUTHENTICATED",
            Self::Transformed => "TRANSFORMED",
            Self::UpstreamCalled => "UPSTREAM_CALLED",
            Self::Adapted => "ADAPTED",
            Self::Responded => "RESPONDED",
        };
        f.write_str(name)
    }
}

fn enter(flow: &'static str, state: FlowState) {
    debug!(flow, state = %state, "Flow transition");
}

//=========================================================================================
// Identity
//=========================================================================================

/// Decides which subject a request acts for.
///
/// With authentication enabled only the verified subject counts and any
/// client-supplied id is ignored. With it disabled the client must name the
/// student itself.
pub fn resolve_subject(
    auth_enabled: bool,
    verified: Option<SubjectId>,
    claimed: Option<&str>,
) -> Result<SubjectId, GatewayError> {
    if auth_enabled {
        return verified.ok_or(GatewayError::Credential(VerificationError::MissingCredential));
    }
    claimed
        .and_then(SubjectId::new)
        .ok_or_else(|| GatewayError::Validation("studentId is required".to_string()))
}

//=========================================================================================
// Flows
//=========================================================================================

/// Runs the generate flow for an authenticated subject.
pub async fn generate_plan(
    engine: &dyn KnowledgeEngine,
    subject: &SubjectId,
    now: DateTime<Utc>,
) -> Result<StudyPlanResponse, GatewayError> {
    const FLOW: &str = "generate";
    enter(FLOW, FlowState::Received);
    enter(FLOW, FlowState::Authenticated);

    let raw = engine.generate_plan(subject).await?;
    enter(FLOW, FlowState::UpstreamCalled);

    let plan = flatten(raw, subject, now)?;
    enter(FLOW, FlowState::Adapted);

    debug!(
        subject = %subject,
        items = plan.study_items.len(),
        "Study plan ready"
    );
    enter(FLOW, FlowState::Responded);
    Ok(plan)
}

/// Checks the path and body of a review before anything is sent upstream.
pub fn validate_review(
    node_id: &str,
    request: &ReviewRequest,
) -> Result<ReviewSubmission, GatewayError> {
    let node_id = node_id.trim();
    if node_id.is_empty() {
        return Err(GatewayError::Validation("nodeId is required".to_string()));
    }

    let raw_grade = match &request.grade {
        None | Some(Value::Null) => {
            return Err(GatewayError::Validation("grade is required".to_string()))
        }
        Some(raw) => raw,
    };
    let grade = raw_grade
        .as_i64()
        .and_then(|g| Grade::try_from(g).ok())
        .ok_or_else(|| {
            GatewayError::Validation("grade must be one of 1, 2, 3 or 4".to_string())
        })?;

    Ok(ReviewSubmission {
        node_id: node_id.to_string(),
        grade,
        response_time_seconds: request.response_time_seconds,
    })
}

/// Runs the review flow and returns the engine's acknowledgement.
pub async fn submit_review(
    engine: &dyn KnowledgeEngine,
    subject: &SubjectId,
    node_id: &str,
    request: &ReviewRequest,
) -> Result<Value, GatewayError> {
    const FLOW: &str = "review";
    enter(FLOW, FlowState::Received);
    enter(FLOW, FlowState::Authenticated);

    let submission = validate_review(node_id, request)?;
    let payload = to_upstream_review(subject, &submission);
    enter(FLOW, FlowState::Transformed);

    let ack = engine.submit_review(&submission.node_id, &payload).await?;
    enter(FLOW, FlowState::UpstreamCalled);

    debug!(
        subject = %subject,
        node_id = %submission.node_id,
        success = payload.success,
        "Review recorded"
    );
    enter(FLOW, FlowState::Responded);
    Ok(match ack {
        Value::Null => json!({ "status": "recorded" }),
        other => other,
    })
}
