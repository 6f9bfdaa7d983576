use axum::Json;
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use super::dto;
use super::handlers;
use super::response;
use crate::error::FieldError;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Wayfare API",
        version = "1.0.0",
        description = "Resolves place concepts against Google Places, Yelp and Amadeus and merges the answers into one canonical record per place.",
    ),
    paths(
        handlers::health::health_check,
        handlers::suggestions::consolidate_suggestions,
        handlers::suggestions::generate_suggestions,
    ),
    components(schemas(
        // Response envelope
        response::ErrorCode,
        response::ApiError,
        FieldError,
        // Domain enums shared on the wire
        models::PlaceCategory,
        models::Provider,
        models::Coordinates,
        models::UnresolvedReason,
        // Suggestions
        dto::ConsolidateRequest,
        dto::GenerateSuggestionsRequest,
        dto::PlaceConceptDto,
        dto::ConceptLocationDto,
        dto::ConceptContextDto,
        dto::SuggestionOptionsDto,
        dto::SuggestionBatchResponse,
        dto::BatchSummaryDto,
        dto::ConceptResultDto,
        dto::ConsolidatedPlaceDto,
        dto::RatingSourceDto,
        dto::MoneyDto,
        dto::SourceRefDto,
        dto::WeatherDto,
        dto::DataQualityDto,
        dto::SuggestionContextDto,
        // Health (handler-local types)
        handlers::health::HealthData,
        handlers::health::ProviderStatus,
        handlers::health::LlmStatus,
        handlers::health::CacheStatus,
    )),
    tags(
        (name = "health", description = "Health check"),
        (name = "suggestions", description = "Place resolution and consolidation"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(utoipa::openapi::security::Http::new(
                utoipa::openapi::security::HttpAuthScheme::Bearer,
            )),
        );
    }
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn redoc_router<S: Clone + Send + Sync + 'static>() -> axum::Router<S> {
    Redoc::with_url("/docs", ApiDoc::openapi()).into()
}
