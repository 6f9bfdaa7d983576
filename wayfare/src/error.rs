use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::api::v1::response::ApiResponse;

use crate::models::Provider;

/// A single field-level validation failure, e.g. `concepts[3].name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum WayfareError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        fields: Vec<FieldError>,
    },

    #[error("{provider} error: {message}")]
    Provider { provider: Provider, message: String },

    #[error("{provider} timed out after {timeout_ms}ms")]
    ProviderTimeout { provider: Provider, timeout_ms: u64 },

    #[error("{provider} rate limit wait exceeded")]
    RateLimited { provider: Provider },

    #[error("All place providers failed for every concept")]
    SystemicFailure,

    #[error("Consolidation error: {0}")]
    Consolidation(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    #[error("LLM rate limit exceeded, retry after {retry_after:?} seconds")]
    LlmRateLimit { retry_after: Option<u64> },

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl WayfareError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn invalid_fields(fields: Vec<FieldError>) -> Self {
        let message = match fields.as_slice() {
            [] => "Invalid request".to_string(),
            [only] => format!("{}: {}", only.field, only.message),
            [first, rest @ ..] => format!(
                "{}: {} (and {} more)",
                first.field,
                first.message,
                rest.len()
            ),
        };
        Self::Validation { message, fields }
    }

    pub fn provider(provider: Provider, message: impl Into<String>) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
        }
    }

    /// Provider-level failures are recovered by the pipeline as an empty slot.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. } | Self::ProviderTimeout { .. } | Self::RateLimited { .. }
        )
    }
}

/// Errors render through the v1 envelope so extractor rejections and
/// handler errors share one wire format.
impl IntoResponse for WayfareError {
    fn into_response(self) -> Response {
        ApiResponse::<()>::from(self).into_response()
    }
}

pub type Result<T> = std::result::Result<T, WayfareError>;
