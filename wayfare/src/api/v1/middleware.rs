//! # V1 API Key Authentication Middleware
//!
//! Protects the suggestion routes with Bearer token authentication against
//! the `WAYFARE_API_KEYS` list. Errors use the v1 `ApiResponse` envelope so
//! auth failures look like every other v1 error.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::api::state::AppState;

use super::response::{ApiResponse, ErrorCode};

/// Enforce `Authorization: Bearer <key>` when API keys are configured.
pub async fn v1_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.auth_enabled() {
        return next.run(request).await;
    }

    let known = bearer_token(&request)
        .map(|token| state.config.server.api_keys.iter().any(|key| key == token));

    match known {
        Ok(true) => next.run(request).await,
        Ok(false) => {
            tracing::debug!(path = %request.uri().path(), "Rejected unknown API key");
            ApiResponse::<()>::error(ErrorCode::Unauthorized, "Invalid API key").into_response()
        }
        Err(message) => ApiResponse::<()>::error(ErrorCode::Unauthorized, message).into_response(),
    }
}

fn bearer_token(request: &Request<Body>) -> Result<&str, &'static str> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or("Missing authorization header")?;
    header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or("Invalid authorization header format. Expected: Bearer <token>")
}
