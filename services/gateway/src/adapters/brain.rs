//! services/gateway/src/adapters/brain.rs
//!
//! This module contains the HTTP adapter for the knowledge engine ("Brain").
//! It implements the `KnowledgeEngine` port from the `core` crate with one
//! bounded-timeout `reqwest` call per operation and no retries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde_json::Value;
use study_gateway_core::ports::{KnowledgeEngine, PortResult, UpstreamError};
use study_gateway_core::{SubjectId, UpstreamReviewPayload};
use tracing::{debug, instrument, warn};

use crate::config::Config;

/// The longest upstream error body excerpt written to the log.
const MAX_LOGGED_DETAIL: usize = 512;
/// Error bodies larger than this are not logged at all.
const MAX_DETAIL_BYTES: usize = 64 * 1024;
/// Upstream bodies larger than this are treated as malformed.
pub const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An HTTP client for the knowledge engine that implements the `KnowledgeEngine` port.
#[derive(Clone)]
pub struct BrainClient {
    client: reqwest::Client,
    base_url: Url,
    plan_timeout: Duration,
    review_timeout: Duration,
}

impl BrainClient {
    /// Creates a new `BrainClient` from the startup configuration.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = http_client()?;
        Ok(Self {
            client,
            base_url: config.brain_api_url.clone(),
            plan_timeout: config.plan_timeout,
            review_timeout: config.review_timeout,
        })
    }

    /// Performs exactly one call to `{base}/{segments...}` and classifies the outcome.
    ///
    /// Path segments are percent-encoded individually. A 2xx response with an
    /// empty body yields `Value::Null`.
    #[instrument(skip_all, fields(method = %method, path = ?segments))]
    pub async fn invoke(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&Value>,
        timeout: Duration,
    ) -> PortResult<Value> {
        let url = self.endpoint(segments)?;
        let timeout_ms = timeout.as_millis() as u64;
        debug!(%url, timeout_ms, "Calling knowledge engine");

        let mut request = self.client.request(method, url).timeout(timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout(timeout_ms)
            } else {
                UpstreamError::Unreachable(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if let Some(err) = UpstreamError::from_status(status) {
            let detail = read_body(response, timeout_ms, MAX_DETAIL_BYTES)
                .await
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default();
            warn!(status, detail = %excerpt(&detail), "Knowledge engine returned an error status");
            return Err(err);
        }

        let bytes = read_body(response, timeout_ms, MAX_RESPONSE_BYTES).await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| UpstreamError::MalformedResponse(e.to_string()))
    }

    fn endpoint(&self, segments: &[&str]) -> PortResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                UpstreamError::Unreachable(format!("'{}' cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Redirects are not followed: a 3xx is classified like any other unexpected
/// status, so each invocation stays a single request.
fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
}

/// Reads at most `limit` bytes of body. A declared or actual overrun is malformed.
async fn read_body(
    mut response: reqwest::Response,
    timeout_ms: u64,
    limit: usize,
) -> PortResult<Vec<u8>> {
    let too_large = || UpstreamError::MalformedResponse(format!("body exceeds {limit} bytes"));
    if response.content_length().is_some_and(|len| len > limit as u64) {
        return Err(too_large());
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| {
        if e.is_timeout() {
            UpstreamError::Timeout(timeout_ms)
        } else {
            UpstreamError::MalformedResponse(e.to_string())
        }
    })? {
        if body.len() + chunk.len() > limit {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Pulls FastAPI's `detail` out of an error body when there is one.
fn excerpt(body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").map(|d| d.to_string()))
        .unwrap_or_else(|| body.to_string());
    detail.chars().take(MAX_LOGGED_DETAIL).collect()
}

//=========================================================================================
// Port Implementation
//=========================================================================================

#[async_trait]
impl KnowledgeEngine for BrainClient {
    async fn generate_plan(&self, subject: &SubjectId) -> PortResult<Value> {
        self.invoke(
            Method::POST,
            &["study", "generate-plan", subject.as_str()],
            None,
            self.plan_timeout,
        )
        .await
    }

    async fn submit_review(
        &self,
        node_id: &str,
        review: &UpstreamReviewPayload,
    ) -> PortResult<Value> {
        let body = serde_json::to_value(review)
            .map_err(|e| UpstreamError::MalformedResponse(e.to_string()))?;
        self.invoke(
            Method::POST,
            &["study", "review", node_id],
            Some(&body),
            self.review_timeout,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use study_gateway_core::Grade;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(base: &str, timeout: Duration) -> BrainClient {
        BrainClient {
            client: http_client().unwrap(),
            base_url: Url::parse(base).unwrap(),
            plan_timeout: timeout,
            review_timeout: timeout,
        }
    }

    fn subject() -> SubjectId {
        SubjectId::new("student-uuid-123").unwrap()
    }

    async fn plan_status(status: u16) -> UpstreamError {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/study/generate-plan/student-uuid-123"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({"detail": "nope"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&format!("{}/api/v1", server.uri()), Duration::from_secs(5));
        client.generate_plan(&subject()).await.unwrap_err()
    }

    #[tokio::test]
    async fn generate_plan_posts_to_the_subject_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/study/generate-plan/student-uuid-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessions": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&format!("{}/api/v1/", server.uri()), Duration::from_secs(5));
        let plan = client.generate_plan(&subject()).await.unwrap();
        assert_eq!(plan, json!({"sessions": []}));
    }

    #[tokio::test]
    async fn error_statuses_are_classified() {
        assert_eq!(plan_status(404).await, UpstreamError::NotFound);
        assert_eq!(plan_status(401).await, UpstreamError::Unauthorized { status: 401 });
        assert_eq!(plan_status(403).await, UpstreamError::Unauthorized { status: 403 });
        assert_eq!(
            plan_status(500).await,
            UpstreamError::UpstreamServerError { status: 500 }
        );
        assert_eq!(
            plan_status(422).await,
            UpstreamError::UnexpectedStatus { status: 422 }
        );
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), Duration::from_millis(50));
        let err = client.generate_plan(&subject()).await.unwrap_err();
        assert_eq!(err, UpstreamError::Timeout(50));
    }

    #[tokio::test]
    async fn non_json_bodies_are_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), Duration::from_secs(5));
        let err = client.generate_plan(&subject()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let uri = format!("http://127.0.0.1:{port}");

        let client = client_for(&uri, Duration::from_secs(5));
        let err = client.generate_plan(&subject()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Unreachable(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn review_sends_the_payload_and_passes_the_ack_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/study/review/node%2F1"))
            .and(body_json(json!({
                "student_id": "student-uuid-123",
                "success": true,
                "response_time_seconds": 12.5,
                "grade": 3
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), Duration::from_secs(5));
        let review = UpstreamReviewPayload {
            student_id: "student-uuid-123".to_string(),
            success: true,
            response_time_seconds: 12.5,
            grade: Grade::Good,
        };
        let ack = client.submit_review("node/1", &review).await.unwrap();
        assert_eq!(ack, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn redirects_are_not_followed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/study/generate-plan/student-uuid-123"))
            .respond_with(
                ResponseTemplate::new(307)
                    .insert_header("Location", format!("{}/elsewhere", server.uri())),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(path("/elsewhere"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessions": []})))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), Duration::from_secs(5));
        let err = client.generate_plan(&subject()).await.unwrap_err();
        assert_eq!(err, UpstreamError::UnexpectedStatus { status: 307 });
    }

    #[tokio::test]
    async fn oversized_bodies_are_malformed() {
        let server = MockServer::start().await;
        let padding = " ".repeat(MAX_RESPONSE_BYTES);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!("{{}}{padding}")))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), Duration::from_secs(5));
        let err = client.generate_plan(&subject()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::MalformedResponse(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn empty_success_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), Duration::from_secs(5));
        let review = UpstreamReviewPayload {
            student_id: "s".to_string(),
            success: false,
            response_time_seconds: 0.0,
            grade: Grade::Repeat,
        };
        assert_eq!(client.submit_review("n1", &review).await.unwrap(), Value::Null);
    }
}
