/// Authentication handlers
use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AuthError,
    middleware::jwt_auth::AuthPrincipal,
    models::{PrincipalSummary, Role},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    /// Email or username; unique per principal.
    #[validate(length(min = 3, max = 254))]
    pub login_key: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254))]
    pub login_key: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub principal: PrincipalSummary,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub principal: PrincipalSummary,
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogoutResponse {
    pub revoked_sessions: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub principal_id: Uuid,
    pub role: Role,
}

/// Generic error body, mirroring `AuthError`'s wire form.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}

/// Register endpoint handler
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Principal registered", body = RegisterResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 409, description = "Login key already registered", body = ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthError> {
    payload
        .validate()
        .map_err(|e| AuthError::Validation(e.to_string()))?;

    let principal = state
        .auth
        .register(&payload.login_key, &payload.password, Role::Member)
        .await?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { principal })))
}

/// Login endpoint handler
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 423, description = "Account locked", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    payload
        .validate()
        .map_err(|_| AuthError::InvalidCredentials)?;

    let outcome = state
        .auth
        .authenticate(&payload.login_key, &payload.password)
        .await?;

    Ok(Json(LoginResponse {
        principal: outcome.principal,
        access_token: outcome.tokens.access_token,
        refresh_token: outcome.tokens.refresh_token,
        access_expires_at: outcome.tokens.access_expires_at,
        refresh_expires_at: outcome.tokens.refresh_expires_at,
    }))
}

/// Refresh endpoint handler
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "Auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token pair rotated", body = RefreshResponse),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse)
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AuthError> {
    payload
        .validate()
        .map_err(|_| AuthError::InvalidOrExpiredToken)?;

    let tokens = state.auth.refresh(&payload.refresh_token).await?;

    Ok(Json(RefreshResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        access_expires_at: tokens.access_expires_at,
        refresh_expires_at: tokens.refresh_expires_at,
    }))
}

/// Logout endpoint handler. Revokes every live session of the authenticated
/// principal.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Sessions revoked", body = LogoutResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    principal: AuthPrincipal,
) -> Result<Json<LogoutResponse>, AuthError> {
    let revoked_sessions = state
        .auth
        .revoke_all_sessions(principal.0.principal_id)
        .await?;

    Ok(Json(LogoutResponse { revoked_sessions }))
}

/// Identity endpoint handler; proves access-token verification end to end.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Verified identity", body = MeResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(principal: AuthPrincipal) -> Json<MeResponse> {
    Json(MeResponse {
        principal_id: principal.0.principal_id,
        role: principal.0.role,
    })
}
