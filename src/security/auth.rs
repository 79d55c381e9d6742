//! Bearer token validation.
//!
//! Tokens are HMAC-signed JWTs issued by the users service and verified here
//! with the shared secret. The gateway never issues or stores tokens.

use std::fmt;

use axum::http::{header, HeaderMap};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::error::AuthError;

/// Claims the gateway relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaims {
    /// Subject (user id). Issuers may encode it as a string or a number.
    #[serde(deserialize_with = "subject_from_any")]
    pub sub: String,
    /// Expiry (Unix timestamp), checked by jsonwebtoken.
    pub exp: u64,
    /// Issued-at (Unix timestamp).
    #[serde(default)]
    pub iat: Option<u64>,
}

fn subject_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct SubjectVisitor;

    impl de::Visitor<'_> for SubjectVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a string or integer subject")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(SubjectVisitor)
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// Anything other than exactly two space-separated parts with a `Bearer`
/// scheme counts as "no token".
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split_whitespace();
    let (scheme, token) = (parts.next()?, parts.next()?);
    if parts.next().is_some() || !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token)
}

/// Verifies signature and expiry with a fixed algorithm and shared secret.
#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenValidator")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl TokenValidator {
    pub fn new(secret: &str, algorithm: Algorithm, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.leeway = leeway_secs;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn validate(&self, token: &str) -> Result<AuthClaims, AuthError> {
        match decode::<AuthClaims>(token, &self.key, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => Err(AuthError::Expired),
                _ => {
                    tracing::debug!(error = %e, "Token rejected");
                    Err(AuthError::Invalid)
                }
            },
        }
    }

    /// Extract and validate the bearer token of a request.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthClaims, AuthError> {
        let token = extract_bearer(headers).ok_or(AuthError::MissingToken)?;
        self.validate(token)
    }
}
