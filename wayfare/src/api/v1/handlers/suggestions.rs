//! v1 suggestion handlers.
//!
//! `POST /api/v1/suggestions:consolidate` resolves caller-supplied concepts;
//! `POST /api/v1/suggestions:generate` asks the LLM for concepts first.

use axum::extract::State;

use crate::api::v1::dto::{ConsolidateRequest, GenerateSuggestionsRequest, SuggestionBatchResponse};
use crate::api::v1::response::{ApiError, ApiResponse};
use crate::api::{AppJson, AppState};
use crate::models::PlaceConcept;

/// `POST /api/v1/suggestions:consolidate`
///
/// Every concept gets exactly one result, in request order. A concept no
/// provider could answer is reported as `unresolved` rather than failing the
/// batch; only a batch where every provider call failed returns 503.
#[utoipa::path(
    post,
    path = "/api/v1/suggestions:consolidate",
    tag = "suggestions",
    operation_id = "suggestions.consolidate",
    request_body = ConsolidateRequest,
    responses(
        (status = 200, description = "One result per concept", body = SuggestionBatchResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Missing or invalid API key", body = ApiError),
        (status = 503, description = "Every place provider failed", body = ApiError),
    )
)]
pub async fn consolidate_suggestions(
    State(state): State<AppState>,
    AppJson(req): AppJson<ConsolidateRequest>,
) -> ApiResponse<SuggestionBatchResponse> {
    let options = req.options.into();
    let concepts: Vec<PlaceConcept> = req.concepts.into_iter().map(Into::into).collect();

    match state.suggestions.consolidate(&concepts, options).await {
        Ok(batch) => ApiResponse::success(batch.into()),
        Err(e) => e.into(),
    }
}

/// `POST /api/v1/suggestions:generate`
///
/// Needs a configured LLM (501 otherwise). If the model fails to produce
/// usable concepts the response is an empty result list.
#[utoipa::path(
    post,
    path = "/api/v1/suggestions:generate",
    tag = "suggestions",
    operation_id = "suggestions.generate",
    request_body = GenerateSuggestionsRequest,
    responses(
        (status = 200, description = "Suggested places", body = SuggestionBatchResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Missing or invalid API key", body = ApiError),
        (status = 501, description = "No LLM configured", body = ApiError),
        (status = 503, description = "Every place provider failed", body = ApiError),
    )
)]
pub async fn generate_suggestions(
    State(state): State<AppState>,
    AppJson(req): AppJson<GenerateSuggestionsRequest>,
) -> ApiResponse<SuggestionBatchResponse> {
    match state.suggestions.generate(req.into()).await {
        Ok(batch) => ApiResponse::success(batch.into()),
        Err(e) => e.into(),
    }
}
