//! crates/study_gateway_core/src/ports.rs
//!
//! Defines the contract the gateway needs from the knowledge engine.
//! The trait forms the boundary of the hexagonal architecture, so the request
//! mediation logic never depends on a concrete HTTP client.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{SubjectId, UpstreamReviewPayload};

//=========================================================================================
// Upstream Error Taxonomy
//=========================================================================================

/// The closed set of ways an upstream call can fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// No response was received (connection refused, DNS failure, reset).
    #[error("knowledge engine unreachable: {0}")]
    Unreachable(String),
    #[error("knowledge engine timed out after {0}ms")]
    Timeout(u64),
    #[error("knowledge engine failed with HTTP {status}")]
    UpstreamServerError { status: u16 },
    #[error("resource not found on the knowledge engine")]
    NotFound,
    #[error("knowledge engine refused access with HTTP {status}")]
    Unauthorized { status: u16 },
    /// Any other non-2xx status, such as 400 or 422.
    #[error("knowledge engine answered with unexpected HTTP {status}")]
    UnexpectedStatus { status: u16 },
    #[error("knowledge engine returned a malformed body: {0}")]
    MalformedResponse(String),
}

impl UpstreamError {
    /// Classifies a response status. Returns `None` for 2xx statuses.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            401 | 403 => Some(Self::Unauthorized { status }),
            404 => Some(Self::NotFound),
            500..=u16::MAX => Some(Self::UpstreamServerError { status }),
            _ => Some(Self::UnexpectedStatus { status }),
        }
    }
}

/// A convenience type alias for `Result<T, UpstreamError>`.
pub type PortResult<T> = Result<T, UpstreamError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait KnowledgeEngine: Send + Sync {
    /// Asks the engine for a fresh study plan. Each call is exactly one
    /// upstream request and is never retried, since generation may have side
    /// effects on the engine.
    async fn generate_plan(&self, subject: &SubjectId) -> PortResult<Value>;

    /// Records a review for a knowledge node and returns the engine's
    /// acknowledgement untouched.
    async fn submit_review(
        &self,
        node_id: &str,
        review: &UpstreamReviewPayload,
    ) -> PortResult<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_onto_the_taxonomy() {
        assert_eq!(UpstreamError::from_status(200), None);
        assert_eq!(UpstreamError::from_status(204), None);
        assert_eq!(UpstreamError::from_status(404), Some(UpstreamError::NotFound));
        assert_eq!(
            UpstreamError::from_status(401),
            Some(UpstreamError::Unauthorized { status: 401 })
        );
        assert_eq!(
            UpstreamError::from_status(403),
            Some(UpstreamError::Unauthorized { status: 403 })
        );
        assert_eq!(
            UpstreamError::from_status(503),
            Some(UpstreamError::UpstreamServerError { status: 503 })
        );
        assert_eq!(
            UpstreamError::from_status(422),
            Some(UpstreamError::UnexpectedStatus { status: 422 })
        );
    }
}
