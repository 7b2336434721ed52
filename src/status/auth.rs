//! Bearer-token gate for the detailed project list.
//!
//! Authorization only ever decides whether `projects` is included in a pull
//! response. It never rejects a request.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use crate::config::{AuthConfig, parse_algorithm};
use crate::errors::ConfigError;

struct Verifier {
    key: DecodingKey,
    validation: Validation,
}

pub struct AuthGate {
    verifier: Option<Verifier>,
}

impl AuthGate {
    /// A gate that authorizes everything.
    pub fn disabled() -> Self {
        Self { verifier: None }
    }

    /// Require tokens signed with exactly `algorithm` using `secret`.
    /// A missing or empty secret disables the gate.
    pub fn new(algorithm: Algorithm, secret: Option<&[u8]>) -> Self {
        let Some(secret) = secret.filter(|s| !s.is_empty()) else {
            return Self::disabled();
        };

        // Only the configured algorithm is accepted. `exp` and `nbf` are
        // checked when present but not required.
        let mut validation = Validation::new(algorithm);
        validation.required_spec_claims.clear();
        validation.validate_aud = false;

        Self {
            verifier: Some(Verifier {
                key: DecodingKey::from_secret(secret),
                validation,
            }),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, ConfigError> {
        let algorithm = parse_algorithm(&config.algorithm)?;
        Ok(Self::new(
            algorithm,
            config.secret.as_deref().map(str::as_bytes),
        ))
    }

    pub fn is_enabled(&self) -> bool {
        self.verifier.is_some()
    }

    pub fn is_authorized(&self, headers: &HeaderMap) -> bool {
        let Some(verifier) = &self.verifier else {
            return true;
        };

        let Some(token) = bearer_token(headers) else {
            return false;
        };

        match jsonwebtoken::decode::<serde_json::Value>(token, &verifier.key, &verifier.validation) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "rejected bearer token");
                false
            }
        }
    }
}

/// Extract `<token>` from `Authorization: bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        [scheme, token] if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
            Some(*token)
        }
        _ => None,
    }
}
