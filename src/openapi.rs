use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;

use crate::handlers::auth::{
    ErrorResponse, LoginRequest, LoginResponse, LogoutResponse, MeResponse, RefreshRequest,
    RefreshResponse, RegisterRequest, RegisterResponse,
};
use crate::models::{PrincipalStatus, PrincipalSummary, Role};

/// OpenAPI document for the authentication endpoints.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::refresh,
        crate::handlers::auth::logout,
        crate::handlers::auth::me
    ),
    components(schemas(
        RegisterRequest,
        LoginRequest,
        RefreshRequest,
        RegisterResponse,
        LoginResponse,
        RefreshResponse,
        LogoutResponse,
        MeResponse,
        ErrorResponse,
        PrincipalSummary,
        Role,
        PrincipalStatus
    )),
    tags(
        (name = "Auth", description = "Authentication & session lifecycle APIs")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}
