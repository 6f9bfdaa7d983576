use async_trait::async_trait;
use serde::Deserialize;

use super::{base_url, read_json, request_error, required_key, search_text, PlaceSource};
use crate::config::ProviderConfig;
use crate::error::{Result, WayfareError};
use crate::models::{Coordinates, GooglePlace, PlaceConcept, Provider, SourceRecord};

const DETAILS_FIELDS: &str = "formatted_phone_number,international_phone_number,website,editorial_summary,opening_hours,url,photos";
const LOCATION_BIAS_RADIUS_M: u32 = 5000;
const MAX_PHOTOS: usize = 5;

#[derive(Debug, Deserialize)]
struct TextSearchResponse {
    status: String,
    #[serde(default)]
    results: Vec<SearchResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    place_id: String,
    name: String,
    formatted_address: Option<String>,
    geometry: Option<Geometry>,
    rating: Option<f64>,
    user_ratings_total: Option<u64>,
    price_level: Option<u8>,
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    photos: Vec<PhotoRef>,
    opening_hours: Option<OpeningHours>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct PhotoRef {
    photo_reference: String,
}

#[derive(Debug, Deserialize)]
struct OpeningHours {
    open_now: Option<bool>,
    #[serde(default)]
    weekday_text: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    result: Option<Details>,
}

#[derive(Debug, Deserialize)]
struct Details {
    formatted_phone_number: Option<String>,
    international_phone_number: Option<String>,
    website: Option<String>,
    editorial_summary: Option<EditorialSummary>,
    opening_hours: Option<OpeningHours>,
    url: Option<String>,
    #[serde(default)]
    photos: Vec<PhotoRef>,
}

#[derive(Debug, Deserialize)]
struct EditorialSummary {
    overview: Option<String>,
}

/// Google Places Text Search, enriched with a Place Details call.
pub struct GooglePlacesClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GooglePlacesClient {
    pub fn new(http: reqwest::Client, config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            http,
            api_key: required_key(Provider::Google, config.api_key.as_ref())?,
            base_url: base_url(Provider::Google, &config.base_url)?,
        })
    }

    fn photo_url(&self, photo: &PhotoRef) -> String {
        format!(
            "{}/photo?maxwidth=800&photo_reference={}",
            self.base_url, photo.photo_reference
        )
    }

    async fn text_search(&self, concept: &PlaceConcept) -> Result<Option<SearchResult>> {
        let mut query = vec![
            ("query", search_text(concept)),
            ("key", self.api_key.clone()),
        ];
        if let Some(coordinates) = concept.coordinates() {
            query.push(("location", format!("{},{}", coordinates.lat, coordinates.lng)));
            query.push(("radius", LOCATION_BIAS_RADIUS_M.to_string()));
        }

        let response = self
            .http
            .get(format!("{}/textsearch/json", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(|e| request_error(Provider::Google, e))?;
        let body: TextSearchResponse = read_json(Provider::Google, response).await?;

        match body.status.as_str() {
            "OK" => Ok(body.results.into_iter().next()),
            "ZERO_RESULTS" => Ok(None),
            status => Err(WayfareError::provider(
                Provider::Google,
                format!(
                    "{status}: {}",
                    body.error_message.unwrap_or_else(|| "no message".to_string())
                ),
            )),
        }
    }

    async fn details(&self, place_id: &str) -> Result<Option<Details>> {
        let response = self
            .http
            .get(format!("{}/details/json", self.base_url))
            .query(&[
                ("place_id", place_id),
                ("fields", DETAILS_FIELDS),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| request_error(Provider::Google, e))?;
        let body: DetailsResponse = read_json(Provider::Google, response).await?;

        if body.status != "OK" {
            return Err(WayfareError::provider(
                Provider::Google,
                format!("details status {}", body.status),
            ));
        }
        Ok(body.result)
    }

    fn to_place(&self, hit: SearchResult, details: Option<Details>) -> GooglePlace {
        let mut place = GooglePlace {
            coordinates: hit
                .geometry
                .map(|g| Coordinates::new(g.location.lat, g.location.lng)),
            photos: hit
                .photos
                .iter()
                .take(MAX_PHOTOS)
                .map(|p| self.photo_url(p))
                .collect(),
            open_now: hit.opening_hours.as_ref().and_then(|h| h.open_now),
            opening_hours: hit
                .opening_hours
                .map(|h| h.weekday_text)
                .unwrap_or_default(),
            place_id: hit.place_id,
            name: hit.name,
            formatted_address: hit.formatted_address,
            rating: hit.rating,
            user_ratings_total: hit.user_ratings_total,
            price_level: hit.price_level,
            types: hit.types,
            ..Default::default()
        };

        if let Some(details) = details {
            place.phone = details
                .formatted_phone_number
                .or(details.international_phone_number);
            place.website = details.website;
            place.editorial_summary = details.editorial_summary.and_then(|s| s.overview);
            place.maps_url = details.url;
            if let Some(hours) = details.opening_hours {
                place.open_now = hours.open_now.or(place.open_now);
                if !hours.weekday_text.is_empty() {
                    place.opening_hours = hours.weekday_text;
                }
            }
            if place.photos.is_empty() {
                place.photos = details
                    .photos
                    .iter()
                    .take(MAX_PHOTOS)
                    .map(|p| self.photo_url(p))
                    .collect();
            }
        }

        place
    }
}

#[async_trait]
impl PlaceSource for GooglePlacesClient {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    async fn search(&self, concept: &PlaceConcept) -> Result<Option<SourceRecord>> {
        let Some(hit) = self.text_search(concept).await? else {
            return Ok(None);
        };

        // Details only enrich; a failure here keeps the search hit.
        let details = match self.details(&hit.place_id).await {
            Ok(details) => details,
            Err(e) => {
                tracing::warn!(place_id = %hit.place_id, error = %e, "Google details lookup failed");
                None
            }
        };

        Ok(Some(SourceRecord::Google(self.to_place(hit, details))))
    }
}
