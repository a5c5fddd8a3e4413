//! Bearer-token actor resolution.
//!
//! Tokens are issued by an external identity service; this module only
//! verifies them and turns their claims into an [`Actor`].

use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use lectern_authz::{Actor, Role};
use lectern_kernel::settings::AuthSettings;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Claims expected in an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    #[serde(default)]
    pub role: Role,
    /// Expiration timestamp
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Verifies HS256 access tokens. Installed on the router as an extension.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(settings: &AuthSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &settings.issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            key: DecodingKey::from_secret(settings.jwt_secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Actor, AppError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "access token rejected");
            AppError::unauthorized("Invalid or expired token")
        })?;

        Ok(Actor::new(data.claims.sub, data.claims.role))
    }
}

/// The authenticated actor of the current request.
///
/// Add this as a handler parameter to require authentication.
pub struct CurrentActor(pub Actor);

impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let verifier = parts
            .extensions
            .get::<TokenVerifier>()
            .cloned()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("token verifier not installed")))?;

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Authentication required"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("Expected a bearer token"))?;

        verifier.verify(token.trim()).map(CurrentActor)
    }
}
