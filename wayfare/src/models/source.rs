use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Coordinates, Money, PlaceCategory};

/// Upstream data source.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Yelp,
    Amadeus,
    Weather,
}

impl Provider {
    /// Place providers in matching priority order.
    pub const PLACES: [Provider; 3] = [Provider::Google, Provider::Yelp, Provider::Amadeus];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Yelp => "yelp",
            Provider::Amadeus => "amadeus",
            Provider::Weather => "weather",
        }
    }

    /// Lower is preferred.
    pub fn priority(&self) -> u8 {
        match self {
            Provider::Google => 0,
            Provider::Yelp => 1,
            Provider::Amadeus => 2,
            Provider::Weather => 3,
        }
    }

    pub fn is_place_provider(&self) -> bool {
        !matches!(self, Provider::Weather)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "google" => Ok(Provider::Google),
            "yelp" => Ok(Provider::Yelp),
            "amadeus" => Ok(Provider::Amadeus),
            "weather" | "openweather" => Ok(Provider::Weather),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// Google Places text search hit, optionally enriched by the details call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GooglePlace {
    pub place_id: String,
    pub name: String,
    pub formatted_address: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub rating: Option<f64>,
    pub user_ratings_total: Option<u64>,
    /// 0..=4 as reported by Google.
    pub price_level: Option<u8>,
    pub types: Vec<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub editorial_summary: Option<String>,
    pub photos: Vec<String>,
    pub opening_hours: Vec<String>,
    pub open_now: Option<bool>,
    pub maps_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YelpCategory {
    pub alias: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YelpBusiness {
    pub id: String,
    pub name: String,
    pub coordinates: Option<Coordinates>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<u64>,
    /// `"$"` .. `"$$$$"`
    pub price: Option<String>,
    pub categories: Vec<YelpCategory>,
    pub phone: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub photos: Vec<String>,
    pub is_closed: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmadeusKind {
    Hotel,
    Activity,
}

/// A hotel (by geocode) or a bookable activity from Amadeus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmadeusOffer {
    pub id: String,
    pub kind: AmadeusKind,
    pub name: String,
    pub coordinates: Option<Coordinates>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub booking_link: Option<String>,
    pub pictures: Vec<String>,
    /// Hotel star rating. Not a review score.
    pub stars: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub temperature_c: f64,
    pub feels_like_c: Option<f64>,
    pub condition: String,
    pub description: Option<String>,
    pub humidity: Option<u8>,
    pub wind_speed_ms: Option<f64>,
    pub icon: Option<String>,
}

/// A single provider result tagged with its origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum SourceRecord {
    Google(GooglePlace),
    Yelp(YelpBusiness),
    Amadeus(AmadeusOffer),
}

impl SourceRecord {
    pub fn provider(&self) -> Provider {
        match self {
            SourceRecord::Google(_) => Provider::Google,
            SourceRecord::Yelp(_) => Provider::Yelp,
            SourceRecord::Amadeus(_) => Provider::Amadeus,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            SourceRecord::Google(p) => &p.place_id,
            SourceRecord::Yelp(b) => &b.id,
            SourceRecord::Amadeus(o) => &o.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SourceRecord::Google(p) => &p.name,
            SourceRecord::Yelp(b) => &b.name,
            SourceRecord::Amadeus(o) => &o.name,
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            SourceRecord::Google(p) => p.coordinates,
            SourceRecord::Yelp(b) => b.coordinates,
            SourceRecord::Amadeus(o) => o.coordinates,
        }
    }

    pub fn address(&self) -> Option<&str> {
        match self {
            SourceRecord::Google(p) => p.formatted_address.as_deref(),
            SourceRecord::Yelp(b) => b.address.as_deref(),
            SourceRecord::Amadeus(o) => o.address.as_deref(),
        }
    }

    pub fn phone(&self) -> Option<&str> {
        match self {
            SourceRecord::Google(p) => p.phone.as_deref(),
            SourceRecord::Yelp(b) => b.phone.as_deref(),
            SourceRecord::Amadeus(_) => None,
        }
    }

    /// Category inferred from the provider's own taxonomy.
    pub fn category(&self) -> Option<PlaceCategory> {
        match self {
            SourceRecord::Google(p) => p
                .types
                .iter()
                .find_map(|t| PlaceCategory::from_google_type(t)),
            SourceRecord::Yelp(b) => b
                .categories
                .iter()
                .find_map(|c| PlaceCategory::from_yelp_alias(&c.alias)),
            SourceRecord::Amadeus(o) => Some(match o.kind {
                AmadeusKind::Hotel => PlaceCategory::Hotel,
                AmadeusKind::Activity => PlaceCategory::Activity,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Ok,
    Empty,
    Failed,
    Timeout,
    RateLimited,
}

impl OutcomeStatus {
    /// Empty responses are answers, not failures.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            OutcomeStatus::Failed | OutcomeStatus::Timeout | OutcomeStatus::RateLimited
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOutcome {
    pub provider: Provider,
    pub status: OutcomeStatus,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

impl ProviderOutcome {
    pub fn new(provider: Provider, status: OutcomeStatus, elapsed_ms: u64) -> Self {
        Self {
            provider,
            status,
            elapsed_ms,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Everything the providers returned for one concept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawApiResults {
    pub google: Option<GooglePlace>,
    pub yelp: Option<YelpBusiness>,
    pub amadeus: Option<AmadeusOffer>,
    pub weather: Option<WeatherReport>,
    pub outcomes: Vec<ProviderOutcome>,
}

impl RawApiResults {
    /// Place records in provider priority order.
    pub fn records(&self) -> Vec<SourceRecord> {
        let mut records = Vec::with_capacity(3);
        if let Some(place) = &self.google {
            records.push(SourceRecord::Google(place.clone()));
        }
        if let Some(business) = &self.yelp {
            records.push(SourceRecord::Yelp(business.clone()));
        }
        if let Some(offer) = &self.amadeus {
            records.push(SourceRecord::Amadeus(offer.clone()));
        }
        records
    }

    pub fn is_empty(&self) -> bool {
        self.google.is_none() && self.yelp.is_none() && self.amadeus.is_none()
    }

    pub fn set(&mut self, record: SourceRecord) {
        match record {
            SourceRecord::Google(place) => self.google = Some(place),
            SourceRecord::Yelp(business) => self.yelp = Some(business),
            SourceRecord::Amadeus(offer) => self.amadeus = Some(offer),
        }
    }

    pub fn place_outcomes(&self) -> impl Iterator<Item = &ProviderOutcome> {
        self.outcomes.iter().filter(|o| o.provider.is_place_provider())
    }

    pub fn attempted_place_calls(&self) -> usize {
        self.place_outcomes().count()
    }

    pub fn failed_place_calls(&self) -> usize {
        self.place_outcomes().filter(|o| o.status.is_failure()).count()
    }

    /// Failures that mean the provider is unreachable. Throttling is not one.
    pub fn unreachable_place_calls(&self) -> usize {
        self.place_outcomes()
            .filter(|o| matches!(o.status, OutcomeStatus::Failed | OutcomeStatus::Timeout))
            .count()
    }

    /// Error messages from failed calls, prefixed with the provider name.
    pub fn errors(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| o.status.is_failure())
            .map(|o| match &o.error {
                Some(error) => format!("{}: {}", o.provider, error),
                None => format!("{}: {:?}", o.provider, o.status),
            })
            .collect()
    }
}
