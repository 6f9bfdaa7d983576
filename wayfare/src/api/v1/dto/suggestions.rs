//! Suggestion request/response DTOs for the v1 API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    self, ConceptOutcome, Coordinates, PlaceCategory, Provider, UnresolvedReason,
};
use crate::services::{BatchResult, BatchSummary, GenerateRequest, SuggestionOptions};

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

/// Request body for `POST /api/v1/suggestions:consolidate`.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidateRequest {
    /// Places to resolve, in the order results should come back.
    pub concepts: Vec<PlaceConceptDto>,
    #[serde(default)]
    pub options: Option<SuggestionOptionsDto>,
}

/// Request body for `POST /api/v1/suggestions:generate`.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSuggestionsRequest {
    /// Free-text travel request, e.g. `"rooftop bars with a view"`.
    pub query: String,
    /// City or region the suggestions should be in.
    pub location: Option<String>,
    /// Restrict suggestions to these categories. Empty means any.
    #[serde(default)]
    pub categories: Vec<PlaceCategory>,
    /// Number of places to suggest, 1 to 20. Defaults to 10.
    pub limit: Option<usize>,
    #[serde(default)]
    pub options: Option<SuggestionOptionsDto>,
}

/// One place the caller wants resolved.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaceConceptDto {
    /// Place name as the caller knows it. 1 to 200 characters.
    pub name: String,
    pub category: PlaceCategory,
    /// Extra words for text search, e.g. a neighbourhood.
    pub search_hint: Option<String>,
    pub location: Option<ConceptLocationDto>,
    pub context: Option<ConceptContextDto>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConceptLocationDto {
    pub city: Option<String>,
    pub country: Option<String>,
    pub coordinates: Option<Coordinates>,
}

/// Trip context echoed back on the resolved place.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConceptContextDto {
    pub day_number: Option<u32>,
    pub time_of_day: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionOptionsDto {
    /// Attach current weather when the concept has coordinates. Default false.
    #[serde(default)]
    pub include_weather: bool,
    /// Allow LLM descriptions and address disambiguation. Default true.
    #[serde(default = "default_true")]
    pub use_ai: bool,
    /// Bypass the concept cache for reads. Default false.
    #[serde(default)]
    pub skip_cache: bool,
}

fn default_true() -> bool {
    true
}

impl From<PlaceConceptDto> for models::PlaceConcept {
    fn from(dto: PlaceConceptDto) -> Self {
        Self {
            name: dto.name,
            category: dto.category,
            search_hint: dto.search_hint,
            location: dto.location.map(|l| models::ConceptLocation {
                city: l.city,
                country: l.country,
                coordinates: l.coordinates,
            }),
            context: dto.context.map(|c| models::ConceptContext {
                day_number: c.day_number,
                time_of_day: c.time_of_day,
                notes: c.notes,
            }),
        }
    }
}

impl From<Option<SuggestionOptionsDto>> for SuggestionOptions {
    fn from(dto: Option<SuggestionOptionsDto>) -> Self {
        match dto {
            Some(dto) => Self {
                include_weather: dto.include_weather,
                use_ai: dto.use_ai,
                skip_cache: dto.skip_cache,
            },
            None => Self::default(),
        }
    }
}

pub const DEFAULT_GENERATE_LIMIT: usize = 10;

impl From<GenerateSuggestionsRequest> for GenerateRequest {
    fn from(req: GenerateSuggestionsRequest) -> Self {
        Self {
            query: req.query,
            location: req.location,
            categories: req.categories,
            limit: req.limit.unwrap_or(DEFAULT_GENERATE_LIMIT),
            options: req.options.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Response DTOs
// ---------------------------------------------------------------------------

/// Response body for both suggestion endpoints.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionBatchResponse {
    /// Exactly one entry per requested concept, in request order.
    pub results: Vec<ConceptResultDto>,
    pub summary: BatchSummaryDto,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummaryDto {
    pub total: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub cache_hits: usize,
    /// Providers that were called at least once for this batch.
    pub providers_queried: Vec<Provider>,
    pub timing_ms: u64,
}

/// Outcome for a single concept.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ConceptResultDto {
    #[serde(rename_all = "camelCase")]
    Resolved {
        place: Box<ConsolidatedPlaceDto>,
        cache_hit: bool,
    },
    #[serde(rename_all = "camelCase")]
    Unresolved {
        concept_name: String,
        reason: UnresolvedReason,
        /// `"provider: message"` for every failed provider call.
        errors: Vec<String>,
    },
}

/// The canonical merged record for one place.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedPlaceDto {
    pub id: Uuid,
    pub canonical_name: String,
    pub category: PlaceCategory,
    pub subcategory: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub formatted_address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    /// Review-count-weighted mean across providers.
    pub aggregated_rating: Option<f64>,
    pub total_review_count: Option<u64>,
    pub rating_breakdown: Vec<RatingSourceDto>,
    /// 1 (inexpensive) to 4 (very expensive).
    pub price_level: Option<u8>,
    pub price_display: Option<String>,
    pub booking_price: Option<MoneyDto>,
    pub description: Option<String>,
    pub photos: Vec<String>,
    pub primary_photo: Option<String>,
    pub hours: Vec<String>,
    pub phones: Vec<String>,
    pub website: Option<String>,
    pub is_open_now: Option<bool>,
    pub booking_url: Option<String>,
    pub sources: Vec<SourceRefDto>,
    pub weather: Option<WeatherDto>,
    /// Mean pairwise match score of the merged group; 1.0 for a single source.
    pub match_confidence: f64,
    pub data_quality: DataQualityDto,
    pub suggestion_context: Option<SuggestionContextDto>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RatingSourceDto {
    pub provider: Provider,
    pub rating: f64,
    pub review_count: u64,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MoneyDto {
    pub amount: f64,
    /// ISO 4217 code.
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SourceRefDto {
    pub provider: Provider,
    pub provider_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeatherDto {
    pub temperature_c: f64,
    pub feels_like_c: Option<f64>,
    pub condition: String,
    pub description: Option<String>,
    pub humidity: Option<u8>,
    pub wind_speed_ms: Option<f64>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataQualityDto {
    pub overall: f64,
    pub completeness: f64,
    pub source_agreement: f64,
    pub source_count: usize,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionContextDto {
    pub day_number: Option<u32>,
    pub time_of_day: Option<String>,
    pub notes: Option<String>,
    pub highlights: Vec<String>,
    pub best_for: Vec<String>,
}

// ---------------------------------------------------------------------------
// Domain → DTO conversions
// ---------------------------------------------------------------------------

impl From<models::ConsolidatedPlace> for ConsolidatedPlaceDto {
    fn from(place: models::ConsolidatedPlace) -> Self {
        Self {
            id: place.id,
            canonical_name: place.canonical_name,
            category: place.category,
            subcategory: place.subcategory,
            coordinates: place.coordinates,
            formatted_address: place.formatted_address,
            city: place.city,
            country: place.country,
            aggregated_rating: place.aggregated_rating,
            total_review_count: place.total_review_count,
            rating_breakdown: place
                .rating_breakdown
                .into_iter()
                .map(|r| RatingSourceDto {
                    provider: r.provider,
                    rating: r.rating,
                    review_count: r.review_count,
                })
                .collect(),
            price_level: place.price_level,
            price_display: place.price_display,
            booking_price: place.booking_price.map(|m| MoneyDto {
                amount: m.amount,
                currency: m.currency,
            }),
            description: place.description,
            photos: place.photos,
            primary_photo: place.primary_photo,
            hours: place.hours,
            phones: place.phones,
            website: place.website,
            is_open_now: place.is_open_now,
            booking_url: place.booking_url,
            sources: place
                .sources
                .into_iter()
                .map(|s| SourceRefDto {
                    provider: s.provider,
                    provider_id: s.provider_id,
                    url: s.url,
                })
                .collect(),
            weather: place.weather.map(|w| WeatherDto {
                temperature_c: w.temperature_c,
                feels_like_c: w.feels_like_c,
                condition: w.condition,
                description: w.description,
                humidity: w.humidity,
                wind_speed_ms: w.wind_speed_ms,
                icon: w.icon,
            }),
            match_confidence: place.match_confidence,
            data_quality: DataQualityDto {
                overall: place.data_quality.overall,
                completeness: place.data_quality.completeness,
                source_agreement: place.data_quality.source_agreement,
                source_count: place.data_quality.source_count,
            },
            suggestion_context: place.suggestion_context.map(|c| SuggestionContextDto {
                day_number: c.day_number,
                time_of_day: c.time_of_day,
                notes: c.notes,
                highlights: c.highlights,
                best_for: c.best_for,
            }),
            last_updated: place.last_updated,
        }
    }
}

impl From<ConceptOutcome> for ConceptResultDto {
    fn from(outcome: ConceptOutcome) -> Self {
        match outcome {
            ConceptOutcome::Resolved { place, cache_hit } => ConceptResultDto::Resolved {
                place: Box::new((*place).into()),
                cache_hit,
            },
            ConceptOutcome::Unresolved {
                concept_name,
                reason,
                errors,
            } => ConceptResultDto::Unresolved {
                concept_name,
                reason,
                errors,
            },
        }
    }
}

impl From<BatchSummary> for BatchSummaryDto {
    fn from(summary: BatchSummary) -> Self {
        Self {
            total: summary.total,
            resolved: summary.resolved,
            unresolved: summary.unresolved,
            cache_hits: summary.cache_hits,
            providers_queried: summary.providers_queried,
            timing_ms: summary.timing_ms,
        }
    }
}

impl From<BatchResult> for SuggestionBatchResponse {
    fn from(batch: BatchResult) -> Self {
        Self {
            results: batch.results.into_iter().map(Into::into).collect(),
            summary: batch.summary.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_parses_camel_case_and_defaults_options() {
        let req: ConsolidateRequest = serde_json::from_value(json!({
            "concepts": [{
                "name": "Louvre",
                "category": "attraction",
                "searchHint": "museum",
                "location": {"city": "Paris", "coordinates": {"lat": 48.86, "lng": 2.33}},
                "context": {"dayNumber": 2, "timeOfDay": "morning"}
            }],
            "options": {"includeWeather": true}
        }))
        .expect("parse");

        let options = SuggestionOptions::from(req.options.clone());
        assert!(options.include_weather);
        assert!(options.use_ai);
        assert!(!options.skip_cache);

        let concept: models::PlaceConcept = req.concepts[0].clone().into();
        assert_eq!(concept.city(), Some("Paris"));
        assert_eq!(concept.context.and_then(|c| c.day_number), Some(2));
    }

    #[test]
    fn unresolved_result_is_tagged() {
        let dto = ConceptResultDto::from(ConceptOutcome::unresolved(
            "Atlantis",
            UnresolvedReason::NoData,
            vec![],
        ));
        let json = serde_json::to_value(&dto).expect("serialize");
        assert_eq!(json["status"], "unresolved");
        assert_eq!(json["conceptName"], "Atlantis");
        assert_eq!(json["reason"], "no_data");
    }

    #[test]
    fn generate_limit_defaults_to_ten() {
        let req: GenerateSuggestionsRequest =
            serde_json::from_value(json!({"query": "street food"})).expect("parse");
        let request = GenerateRequest::from(req);
        assert_eq!(request.limit, DEFAULT_GENERATE_LIMIT);
        assert!(request.categories.is_empty());
    }
}
