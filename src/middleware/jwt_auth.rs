/// Bearer-token extraction for protected routes
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::AuthError;
use crate::security::token::AccessIdentity;
use crate::AppState;

/// Verified identity extracted from the `Authorization: Bearer` header.
/// Verification is signature + expiry only; no store round-trip.
#[derive(Debug, Clone)]
pub struct AuthPrincipal(pub AccessIdentity);

#[async_trait]
impl FromRequestParts<AppState> for AuthPrincipal {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        let identity = state.auth.verify_access_token(token)?;
        Ok(AuthPrincipal(identity))
    }
}
