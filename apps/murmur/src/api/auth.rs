//! # Authentication Module
//!
//! Bearer token (JWT) issuance and verification for the Murmur HTTP API,
//! plus the `CurrentUser` extractor protected handlers declare.
//!
//! ## Configuration
//!
//! - `MURMUR_JWT_SECRET`: HS256 signing secret. When unset the server warns
//!   loudly and falls back to a development secret.
//!
//! Tokens embed the user id as `sub` and are valid for 30 days. Issuance
//! and verification share one `TokenSigner`, so they always agree on secret
//! and algorithm.

use super::AppState;
use super::types::MessageResponse;
use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use murmur_core::{SocialError, UserId, primitives::TOKEN_TTL_DAYS};
use serde::{Deserialize, Serialize};

/// Fallback secret for development setups without `MURMUR_JWT_SECRET`.
const DEV_SECRET: &str = "murmur-dev-secret";

// =============================================================================
// TOKEN SIGNER
// =============================================================================

/// JWT claims: subject user id plus the standard time fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: u64,
    pub iat: i64,
    pub exp: i64,
}

/// Get the signing secret from the environment.
///
/// Returns `Some(secret)` if `MURMUR_JWT_SECRET` is set and non-empty,
/// `None` otherwise.
pub fn get_jwt_secret_from_env() -> Option<String> {
    std::env::var("MURMUR_JWT_SECRET")
        .ok()
        .filter(|s| !s.is_empty())
}

/// Issues and verifies HS256 bearer tokens with a shared secret.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Create a signer from an explicit secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Create a signer from `MURMUR_JWT_SECRET`, warning loudly when the
    /// development fallback is used.
    #[must_use]
    pub fn from_env() -> Self {
        match get_jwt_secret_from_env() {
            Some(secret) => Self::new(&secret),
            None => {
                tracing::warn!(
                    "⚠️  MURMUR_JWT_SECRET is not set - using a built-in development secret. \
                     Tokens are forgeable; do not run like this in production!"
                );
                Self::new(DEV_SECRET)
            }
        }
    }

    /// Issue a token for the given user, valid for 30 days.
    pub fn issue(&self, user: UserId) -> Result<String, SocialError> {
        let iat = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: user.0,
            iat,
            exp: iat + TOKEN_TTL_DAYS * 24 * 60 * 60,
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| SocialError::Io(format!("Token signing failed: {e}")))
    }

    /// Verify a token's signature and expiry and return its subject.
    pub fn verify(&self, token: &str) -> Result<UserId, SocialError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| UserId(data.claims.sub))
            .map_err(|_| SocialError::Authentication)
    }
}

// =============================================================================
// CURRENT USER EXTRACTOR
// =============================================================================

/// The authenticated caller, resolved from the bearer token.
///
/// Implemented as an extractor rather than router-wide middleware because
/// public and protected routes share one router; a handler that declares
/// `CurrentUser` is protected, everything else is public.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
    pub avatar: String,
}

fn unauthorized(message: &str) -> (StatusCode, Json<MessageResponse>) {
    (StatusCode::UNAUTHORIZED, Json(MessageResponse::new(message)))
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = (StatusCode, Json<MessageResponse>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let Some(header_value) = header_value else {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_authorization_header",
                "Missing Authorization header"
            );
            return Err(unauthorized("Not authorized, no token"));
        };
        let Some(token) = header_value.strip_prefix("Bearer ") else {
            tracing::warn!(
                event = "auth_failure",
                reason = "malformed_authorization_header",
                "Authorization header is not a bearer token"
            );
            return Err(unauthorized("Not authorized, no token"));
        };

        let Ok(user_id) = state.tokens.verify(token) else {
            tracing::warn!(
                event = "auth_failure",
                reason = "token_verification_failed",
                "Token verification failed"
            );
            return Err(unauthorized("Not authorized, token failed"));
        };

        // Re-resolve the subject: a token for a vanished account is invalid.
        let session = state.session.read().await;
        match session.user(user_id) {
            Ok(user) => Ok(Self {
                id: user.id,
                username: user.username.as_str().to_string(),
                avatar: user.avatar.clone(),
            }),
            Err(_) => {
                tracing::warn!(
                    event = "auth_failure",
                    reason = "unknown_subject",
                    subject = user_id.0,
                    "Token subject no longer resolves to a user"
                );
                Err(unauthorized("Not authorized, user not found"))
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_then_verify_round_trip() {
        let signer = TokenSigner::new("test-secret");
        let token = signer.issue(UserId(42));
        assert!(token.is_ok());
        let token = token.unwrap_or_default();
        assert!(signer.verify(&token).is_ok_and(|id| id == UserId(42)));
    }

    #[test]
    fn verify_rejects_other_secret() {
        let signer = TokenSigner::new("test-secret");
        let other = TokenSigner::new("other-secret");
        let token = signer.issue(UserId(42)).unwrap_or_default();
        assert!(matches!(
            other.verify(&token),
            Err(SocialError::Authentication)
        ));
    }

    #[test]
    fn verify_rejects_garbage() {
        let signer = TokenSigner::new("test-secret");
        assert!(signer.verify("not-a-jwt").is_err());
    }
}
