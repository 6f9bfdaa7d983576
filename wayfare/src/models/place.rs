use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ConceptContext, Coordinates, PlaceCategory, Provider, WeatherReport};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: f64,
    pub currency: String,
}

impl Money {
    pub fn new(amount: f64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }
}

/// One provider's contribution to the aggregated rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSource {
    pub provider: Provider,
    pub rating: f64,
    pub review_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub provider: Provider,
    pub provider_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQualityScore {
    pub overall: f64,
    pub completeness: f64,
    pub source_agreement: f64,
    pub source_count: usize,
}

/// Where in the trip the caller wanted this place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuggestionContext {
    pub day_number: Option<u32>,
    pub time_of_day: Option<String>,
    pub notes: Option<String>,
    pub highlights: Vec<String>,
    pub best_for: Vec<String>,
}

impl From<&ConceptContext> for SuggestionContext {
    fn from(context: &ConceptContext) -> Self {
        Self {
            day_number: context.day_number,
            time_of_day: context.time_of_day.clone(),
            notes: context.notes.clone(),
            ..Default::default()
        }
    }
}

/// The canonical record produced from one match group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedPlace {
    pub id: Uuid,
    pub canonical_name: String,
    pub category: PlaceCategory,
    pub subcategory: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub formatted_address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub aggregated_rating: Option<f64>,
    pub total_review_count: Option<u64>,
    pub rating_breakdown: Vec<RatingSource>,
    pub price_level: Option<u8>,
    pub price_display: Option<String>,
    pub booking_price: Option<Money>,
    pub description: Option<String>,
    pub photos: Vec<String>,
    pub primary_photo: Option<String>,
    pub hours: Vec<String>,
    pub phones: Vec<String>,
    pub website: Option<String>,
    pub is_open_now: Option<bool>,
    pub booking_url: Option<String>,
    pub sources: Vec<SourceRef>,
    pub weather: Option<WeatherReport>,
    pub match_confidence: f64,
    pub data_quality: DataQualityScore,
    pub suggestion_context: Option<SuggestionContext>,
    pub last_updated: DateTime<Utc>,
}

impl ConsolidatedPlace {
    pub fn providers(&self) -> Vec<Provider> {
        self.sources.iter().map(|s| s.provider).collect()
    }
}
