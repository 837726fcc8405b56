//! services/gateway/src/web/state.rs
//!
//! Defines the application state shared by all requests. It is built once at
//! startup and never mutated afterwards.

use crate::config::Config;
use crate::web::auth::CredentialVerifier;
use study_gateway_core::ports::KnowledgeEngine;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// `None` when authentication is disabled.
    pub verifier: Option<CredentialVerifier>,
    pub engine: Arc<dyn KnowledgeEngine>,
}

impl AppState {
    pub fn new(config: Arc<Config>, engine: Arc<dyn KnowledgeEngine>) -> Self {
        let verifier = config
            .jwt_secret
            .as_deref()
            .filter(|_| config.auth_enabled)
            .map(CredentialVerifier::new);
        Self {
            config,
            verifier,
            engine,
        }
    }
}
