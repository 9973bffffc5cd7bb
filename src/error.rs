use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Why an otherwise-authenticated account may not log in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EligibilityReason {
    Suspended,
    Unverified,
}

impl std::fmt::Display for EligibilityReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EligibilityReason::Suspended => write!(f, "account suspended"),
            EligibilityReason::Unverified => write!(f, "account not verified"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown login key, wrong secret, or any ambiguous credential failure.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Lockout policy is currently active for the account.
    #[error("account locked")]
    AccountLocked { retry_after: chrono::Duration },

    /// Account exists and the secret matched, but the account may not log in.
    #[error("{0}")]
    AccountNotEligible(EligibilityReason),

    /// Token failed signature, expiry, or registry lookup.
    #[error("invalid or expired token")]
    InvalidOrExpiredToken,

    /// Presentation of an already-rotated refresh token. Internal-only
    /// classification; the wire response is identical to
    /// `InvalidOrExpiredToken`.
    #[error("token reuse detected")]
    TokenReuseDetected,

    #[error("login key already registered")]
    LoginKeyTaken,

    #[error("password does not meet strength requirements")]
    WeakPassword,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;

impl AuthError {
    /// Collapse internal-only classifications into the kind a client is
    /// allowed to see. `TokenReuseDetected` is never surfaced verbatim.
    pub fn into_client_kind(self) -> AuthError {
        match self {
            AuthError::TokenReuseDetected => AuthError::InvalidOrExpiredToken,
            other => other,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "invalid credentials", "status": 401 }),
            ),
            AuthError::AccountLocked { retry_after } => {
                // Whole seconds, rounded up. Never the exact unlock timestamp.
                let secs = ((retry_after.num_milliseconds() + 999) / 1000).max(1);
                (
                    StatusCode::LOCKED,
                    json!({
                        "error": "account locked",
                        "status": 423,
                        "retry_after_secs": secs
                    }),
                )
            }
            AuthError::AccountNotEligible(reason) => (
                StatusCode::FORBIDDEN,
                json!({ "error": reason.to_string(), "status": 403 }),
            ),
            AuthError::InvalidOrExpiredToken | AuthError::TokenReuseDetected => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "invalid or expired token", "status": 401 }),
            ),
            AuthError::LoginKeyTaken => (
                StatusCode::CONFLICT,
                json!({ "error": "login key already registered", "status": 409 }),
            ),
            AuthError::WeakPassword => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "password does not meet strength requirements",
                    "status": 400
                }),
            ),
            AuthError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": msg, "status": 400 }),
            ),
            AuthError::Store(msg) | AuthError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error at response boundary");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal error", "status": 500 }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Store(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuse_detection_folds_into_token_error() {
        let folded = AuthError::TokenReuseDetected.into_client_kind();
        assert!(matches!(folded, AuthError::InvalidOrExpiredToken));
    }

    #[test]
    fn other_kinds_fold_to_themselves() {
        assert!(matches!(
            AuthError::InvalidCredentials.into_client_kind(),
            AuthError::InvalidCredentials
        ));
    }
}
