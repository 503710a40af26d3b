//! Authentication — bearer tokens for the Lockbox API.
//!
//! Two auth paths:
//! 1. **JWT auth**: interactive clients send a session JWT issued by the
//!    identity provider as `Authorization: Bearer <jwt>`. The payload is
//!    decoded and checked for expiry; `sub`, `email`, and `roles` become
//!    the authenticated [`Subject`].
//! 2. **API token auth**: automation uses `Authorization: Bearer
//!    lbt_<token>`. Tokens are SHA-256 hashed before storage — lookup is
//!    by hash, never plaintext.
//!
//! Authentication produces identity only. Groups, scope modes, and
//! access decisions are resolved per request downstream.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use lockbox_authz::Subject;
use lockbox_store::AuthzStore;

use crate::error::ApiError;
use crate::state::AppState;

/// Prefix marking an opaque Lockbox API token.
const API_TOKEN_PREFIX: &str = "lbt_";

/// Hash a token with SHA-256 for storage/lookup.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(digest)
}

/// Generate a new API token string.
///
/// Format: `lbt_<32 hex chars>` (128 bits of randomness from UUID v4).
#[must_use]
pub fn generate_api_token() -> String {
    let id = Uuid::new_v4();
    format!("{API_TOKEN_PREFIX}{}", id.as_simple())
}

/// Extract the token prefix for display (first 12 chars).
#[must_use]
pub fn token_prefix(token: &str) -> String {
    let end = token.len().min(12);
    format!("{}...", &token[..end])
}

/// Claims extracted from a session JWT.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SessionClaims {
    /// Subject — the user's UUID.
    pub sub: String,
    /// User's email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Role list assigned by the identity provider.
    #[serde(default)]
    pub roles: Vec<String>,
    /// JWT expiration timestamp.
    pub exp: u64,
    /// JWT issued-at timestamp.
    pub iat: u64,
}

/// Decode a session JWT's payload and check expiration.
///
/// Signature verification happens at the identity provider's edge proxy;
/// this decodes the base64url payload and rejects expired or malformed
/// tokens.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] if the JWT is malformed or expired.
pub fn decode_session_jwt(token: &str) -> Result<SessionClaims, ApiError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(ApiError::Unauthorized("invalid JWT format".to_owned()));
    }

    let payload_bytes = base64_url_decode(parts[1])
        .map_err(|_| ApiError::Unauthorized("invalid JWT payload encoding".to_owned()))?;

    let claims: SessionClaims = serde_json::from_slice(&payload_bytes)
        .map_err(|e| ApiError::Unauthorized(format!("invalid JWT claims: {e}")))?;

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| ApiError::Internal(format!("system time error: {e}")))?
        .as_secs();

    if claims.exp < now {
        return Err(ApiError::Unauthorized("JWT expired".to_owned()));
    }

    Ok(claims)
}

/// Decode a base64url-encoded string (no padding).
fn base64_url_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(input)
}

/// Authenticate a bearer token into a [`Subject`].
///
/// Tries API tokens first (prefix `lbt_`), then session JWTs.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] if no valid identity is found.
pub async fn authenticate(state: &AppState, token: &str) -> Result<Subject, ApiError> {
    if token.starts_with(API_TOKEN_PREFIX) {
        let token_hash = hash_token(token);
        let api_token = state
            .store
            .api_token_by_hash(&token_hash)
            .await?
            .ok_or_else(|| {
                ApiError::Unauthorized("invalid or expired API token".to_owned())
            })?;

        // Update last_used_at in the background.
        let store = Arc::clone(&state.store);
        let token_id = api_token.id;
        tokio::spawn(async move {
            let _ = store.touch_api_token(token_id).await;
        });

        Ok(Subject {
            user_id: api_token.user_id,
            email: api_token.email,
            roles: api_token.roles,
        })
    } else {
        let claims = decode_session_jwt(token)?;
        let user_id: Uuid = claims
            .sub
            .parse()
            .map_err(|_| ApiError::Unauthorized("JWT subject is not a user ID".to_owned()))?;

        Ok(Subject {
            user_id,
            email: claims.email.unwrap_or_default(),
            roles: claims.roles,
        })
    }
}

/// Axum middleware that authenticates API requests.
///
/// Injects [`Subject`] into request extensions on success.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] if the `Authorization` header is
/// missing, malformed, or carries an invalid/expired token.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let Some(header) = auth_header else {
        return Err(ApiError::Unauthorized(
            "missing Authorization header".to_owned(),
        ));
    };

    let token = header.strip_prefix("Bearer ").ok_or_else(|| {
        ApiError::Unauthorized("Authorization header must use Bearer scheme".to_owned())
    })?;

    let subject = authenticate(&state, token).await?;
    req.extensions_mut().insert(subject);

    Ok(next.run(req).await)
}
