//! Shared helpers for the router-level tests.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use gateway_lib::{
    adapters::BrainClient,
    config::Config,
    web::{self, auth::CredentialVerifier, state::AppState},
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use study_gateway_core::SubjectId;
use tower::ServiceExt;

pub const SECRET: &str = "integration-secret";
pub const STUDENT: &str = "student-uuid-123";

/// Builds a config whose knowledge engine lives at `brain_url`.
pub fn config(brain_url: &str, extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("JWT_SECRET".to_string(), SECRET.to_string()),
        ("BRAIN_API_URL".to_string(), brain_url.to_string()),
        ("PLAN_TIMEOUT_MS".to_string(), "2000".to_string()),
        ("REVIEW_TIMEOUT_MS".to_string(), "2000".to_string()),
    ]);
    for (key, value) in extra {
        vars.insert(key.to_string(), value.to_string());
    }
    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

pub fn app(config: Config) -> Router {
    let brain = BrainClient::new(&config).unwrap();
    let state = AppState::new(Arc::new(config), Arc::new(brain));
    web::router(Arc::new(state))
}

pub fn token_for(subject: &str, secret: &str, ttl: Duration) -> String {
    CredentialVerifier::new(secret)
        .issue(&SubjectId::new(subject).unwrap(), ttl, Utc::now())
        .unwrap()
}

pub fn bearer(subject: &str) -> String {
    format!("Bearer {}", token_for(subject, SECRET, Duration::hours(1)))
}

pub fn post(uri: &str, authorization: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Sends one request through the router and returns the status and JSON body.
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}
