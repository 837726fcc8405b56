//! services/gateway/src/web/auth.rs
//!
//! The credential verifier: validates `Authorization: Bearer <jwt>` headers
//! against the server-held secret and extracts the subject id. It also mints
//! tokens for local development and tests.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use study_gateway_core::SubjectId;

/// Why a credential was rejected. Every variant surfaces to the client as a
/// bare 401; the details are for the log only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("no Authorization header")]
    MissingCredential,
    #[error("Authorization header is not of the form 'Bearer <token>'")]
    MalformedCredential,
    #[error("token rejected: {0}")]
    InvalidOrExpiredCredential(String),
}

/// Why a credential could not be minted.
#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error("token lifetime reaches past the representable time range")]
    LifetimeOutOfRange,
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// The claims carried by a gateway credential.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    /// Expiry as seconds since the Unix epoch.
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

#[derive(Clone)]
pub struct CredentialVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl CredentialVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the caller's clock in `verify`.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verifies a raw `Authorization` header value at time `now`.
    pub fn verify(
        &self,
        raw_header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SubjectId, VerificationError> {
        let raw = raw_header.ok_or(VerificationError::MissingCredential)?;
        let token = bearer_token(raw)?;

        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| VerificationError::InvalidOrExpiredCredential(e.to_string()))?
            .claims;

        if now.timestamp() >= claims.exp {
            return Err(VerificationError::InvalidOrExpiredCredential(format!(
                "expired at {}",
                claims.exp
            )));
        }

        SubjectId::new(&claims.sub).ok_or_else(|| {
            VerificationError::InvalidOrExpiredCredential("blank subject".to_string())
        })
    }

    /// Mints a token for `subject` that expires `ttl` after `now`.
    pub fn issue(
        &self,
        subject: &SubjectId,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, IssueError> {
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or(IssueError::LifetimeOutOfRange)?;
        let claims = Claims {
            sub: subject.to_string(),
            exp: expires_at.timestamp(),
            iat: Some(now.timestamp()),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }
}

fn bearer_token(raw: &str) -> Result<&str, VerificationError> {
    let mut parts = raw.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Ok(token),
        _ => Err(VerificationError::MalformedCredential),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "athena-secret-key";

    fn subject() -> SubjectId {
        SubjectId::new("student-uuid-123").unwrap()
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {token}")
    }

    #[test]
    fn valid_token_yields_its_subject() {
        let verifier = CredentialVerifier::new(SECRET);
        let now = Utc::now();
        let token = verifier.issue(&subject(), Duration::hours(1), now).unwrap();

        let verified = verifier.verify(Some(&bearer(&token)), now).unwrap();
        assert_eq!(verified, subject());
    }

    #[test]
    fn missing_header_is_reported_as_missing() {
        let verifier = CredentialVerifier::new(SECRET);
        assert_eq!(
            verifier.verify(None, Utc::now()),
            Err(VerificationError::MissingCredential)
        );
    }

    #[test]
    fn headers_without_a_bearer_token_are_malformed() {
        let verifier = CredentialVerifier::new(SECRET);
        for raw in ["", "Bearer", "Bearer ", "Basic dXNlcjpwYXNz", "bearer abc", "Bearer a b"] {
            assert_eq!(
                verifier.verify(Some(raw), Utc::now()),
                Err(VerificationError::MalformedCredential),
                "header {raw:?}"
            );
        }
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let verifier = CredentialVerifier::new(SECRET);
        let issued_at = Utc::now() - Duration::hours(2);
        let token = verifier.issue(&subject(), Duration::hours(1), issued_at).unwrap();

        let err = verifier.verify(Some(&bearer(&token)), Utc::now()).unwrap_err();
        assert!(matches!(err, VerificationError::InvalidOrExpiredCredential(_)));
    }

    #[test]
    fn expiry_is_judged_against_the_supplied_clock() {
        let verifier = CredentialVerifier::new(SECRET);
        let now = Utc::now();
        let token = verifier.issue(&subject(), Duration::seconds(60), now).unwrap();

        assert!(verifier.verify(Some(&bearer(&token)), now + Duration::seconds(59)).is_ok());
        assert!(verifier.verify(Some(&bearer(&token)), now + Duration::seconds(60)).is_err());
    }

    #[test]
    fn lifetimes_past_the_clock_range_are_refused() {
        let verifier = CredentialVerifier::new(SECRET);
        let ttl = Duration::try_seconds(i64::MAX / 1_000).unwrap();

        let err = verifier.issue(&subject(), ttl, Utc::now()).unwrap_err();
        assert!(matches!(err, IssueError::LifetimeOutOfRange));
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let now = Utc::now();
        let token = CredentialVerifier::new("someone-else")
            .issue(&subject(), Duration::hours(1), now)
            .unwrap();

        let err = CredentialVerifier::new(SECRET)
            .verify(Some(&bearer(&token)), now)
            .unwrap_err();
        assert!(matches!(err, VerificationError::InvalidOrExpiredCredential(_)));
    }

    #[test]
    fn garbage_and_blank_subjects_are_rejected() {
        let verifier = CredentialVerifier::new(SECRET);
        let now = Utc::now();
        assert!(verifier.verify(Some("Bearer not.a.jwt"), now).is_err());

        let claims = Claims {
            sub: "  ".to_string(),
            exp: now.timestamp() + 600,
            iat: None,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        let err = verifier.verify(Some(&bearer(&token)), now).unwrap_err();
        assert!(matches!(err, VerificationError::InvalidOrExpiredCredential(_)));
    }
}
