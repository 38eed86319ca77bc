use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{config::AppConfig, error::ApiError, models::Role};

/// Claims
///
/// The payload signed into every issued JWT. Identity and role are embedded so protected
/// routes never need a database round trip to authorize a caller.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user id rendered as a string, per RFC 7519.
    pub sub: String,
    /// Issuer (iss): must match `AppConfig::jwt_issuer` on verification.
    pub iss: String,
    /// Issued At (iat).
    pub iat: i64,
    /// Expiration Time (exp). Checked only when `AppConfig::jwt_validate_exp` is set.
    pub exp: i64,
    /// Numeric user id.
    pub uid: i64,
    /// Display name at the time of login.
    pub name: String,
    pub role: Role,
}

/// AuthUser
///
/// The resolved identity of an authenticated request, decoded from the bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub name: String,
    pub role: Role,
}

impl AuthUser {
    /// require_role
    ///
    /// The single authorization predicate used by every gated handler. Fails with 403
    /// when the caller's role does not satisfy `required`.
    pub fn require_role(&self, required: Role) -> Result<(), ApiError> {
        if self.role.permits(required) {
            Ok(())
        } else {
            tracing::debug!(user_id = self.id, role = %self.role, required = %required, "permission denied");
            Err(ApiError::Forbidden)
        }
    }

    /// require_owner_or_admin
    ///
    /// Passes when the caller owns the resource or holds the admin role.
    pub fn require_owner_or_admin(&self, owner_id: Option<i64>) -> Result<(), ApiError> {
        if owner_id == Some(self.id) {
            return Ok(());
        }
        self.require_role(Role::Admin)
    }
}

/// issue_token
///
/// Signs an HS256 token for the given identity, valid for `config.token_ttl_secs`.
/// Signing failure is the only error and surfaces as a 500.
pub fn issue_token(
    config: &AppConfig,
    user_id: i64,
    name: &str,
    role: Role,
) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iss: config.jwt_issuer.clone(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(config.token_ttl_secs)).timestamp(),
        uid: user_id,
        name: name.to_string(),
        role,
    };

    let key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
    encode(&Header::new(Algorithm::HS256), &claims, &key).map_err(|e| {
        tracing::error!("failed to sign token: {}", e);
        ApiError::Internal("Failed to generate token".to_string())
    })
}

/// verify_token
///
/// Checks the signature and issuer, then decodes the embedded identity. Every failure
/// (bad signature, malformed token, wrong issuer, missing or mistyped claims, and expiry
/// when enabled) collapses into the same 401.
pub fn verify_token(config: &AppConfig, token: &str) -> Result<AuthUser, ApiError> {
    let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = config.jwt_validate_exp;
    validation.set_issuer(&[config.jwt_issuer.as_str()]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);

    let data = decode::<Claims>(token, &key, &validation).map_err(|e| {
        tracing::debug!("token rejected: {:?}", e.kind());
        ApiError::unauthorized()
    })?;

    Ok(AuthUser {
        id: data.claims.uid,
        name: data.claims.name,
        role: data.claims.role,
    })
}

/// bearer_token
///
/// Pulls the raw token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(ApiError::unauthorized)
}

/// AuthUser Extractor Implementation
///
/// Usable as a handler argument on any protected route. The authentication middleware
/// resolves the identity once and stores it in the request extensions; the extractor
/// reuses that value and only decodes the header itself when the middleware did not run.
///
/// Rejection: `ApiError::Unauthorized` (401).
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let config = AppConfig::from_ref(state);
        let token = bearer_token(&parts.headers)?;
        verify_token(&config, token)
    }
}
