use async_trait::async_trait;
use serde::Deserialize;

use super::{base_url, read_json, request_error, required_key, PlaceSource};
use crate::config::ProviderConfig;
use crate::error::Result;
use crate::models::{
    Coordinates, PlaceCategory, PlaceConcept, Provider, SourceRecord, YelpBusiness, YelpCategory,
};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    businesses: Vec<Business>,
}

#[derive(Debug, Deserialize)]
struct Business {
    id: String,
    name: String,
    coordinates: Option<BusinessCoordinates>,
    location: Option<Location>,
    rating: Option<f64>,
    review_count: Option<u64>,
    price: Option<String>,
    #[serde(default)]
    categories: Vec<Category>,
    display_phone: Option<String>,
    phone: Option<String>,
    url: Option<String>,
    image_url: Option<String>,
    #[serde(default)]
    photos: Vec<String>,
    is_closed: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct BusinessCoordinates {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Location {
    #[serde(default)]
    display_address: Vec<String>,
    city: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Category {
    alias: String,
    title: String,
}

/// Yelp category filter for a concept category.
fn category_filter(category: PlaceCategory) -> Option<&'static str> {
    match category {
        PlaceCategory::Restaurant => Some("restaurants"),
        PlaceCategory::Cafe => Some("cafes"),
        PlaceCategory::Bar => Some("bars"),
        PlaceCategory::Nightlife => Some("nightlife"),
        PlaceCategory::Hotel => Some("hotels"),
        PlaceCategory::Shopping => Some("shopping"),
        PlaceCategory::Activity => Some("tours"),
        PlaceCategory::Attraction => Some("arts,landmarks"),
        PlaceCategory::Transport => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<Business> for YelpBusiness {
    fn from(business: Business) -> Self {
        let coordinates = business
            .coordinates
            .and_then(|c| Some(Coordinates::new(c.latitude?, c.longitude?)));
        let (address, city, country) = match business.location {
            Some(location) => (
                Some(location.display_address.join(", ")).filter(|a| !a.is_empty()),
                location.city,
                location.country,
            ),
            None => (None, None, None),
        };

        YelpBusiness {
            id: business.id,
            name: business.name,
            coordinates,
            address,
            city,
            country,
            rating: business.rating,
            review_count: business.review_count,
            price: business.price,
            categories: business
                .categories
                .into_iter()
                .map(|c| YelpCategory {
                    alias: c.alias,
                    title: c.title,
                })
                .collect(),
            phone: non_empty(business.display_phone).or(non_empty(business.phone)),
            url: business.url,
            image_url: non_empty(business.image_url),
            photos: business.photos,
            is_closed: business.is_closed,
        }
    }
}

/// Yelp Fusion business search.
pub struct YelpClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl YelpClient {
    pub fn new(http: reqwest::Client, config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            http,
            api_key: required_key(Provider::Yelp, config.api_key.as_ref())?,
            base_url: base_url(Provider::Yelp, &config.base_url)?,
        })
    }
}

#[async_trait]
impl PlaceSource for YelpClient {
    fn provider(&self) -> Provider {
        Provider::Yelp
    }

    async fn search(&self, concept: &PlaceConcept) -> Result<Option<SourceRecord>> {
        let mut query: Vec<(&str, String)> = vec![
            ("term", concept.name.trim().to_string()),
            ("limit", "1".to_string()),
        ];

        // Yelp requires either coordinates or a location string.
        if let Some(coordinates) = concept.coordinates() {
            query.push(("latitude", coordinates.lat.to_string()));
            query.push(("longitude", coordinates.lng.to_string()));
        } else if let Some(location) = concept
            .location_display()
            .or_else(|| concept.search_hint.clone().filter(|h| !h.trim().is_empty()))
        {
            query.push(("location", location));
        } else {
            tracing::debug!(concept = %concept.name, "Skipping Yelp search without a location");
            return Ok(None);
        }

        if let Some(categories) = category_filter(concept.category) {
            query.push(("categories", categories.to_string()));
        }

        let response = self
            .http
            .get(format!("{}/businesses/search", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&query)
            .send()
            .await
            .map_err(|e| request_error(Provider::Yelp, e))?;
        let body: SearchResponse = read_json(Provider::Yelp, response).await?;

        Ok(body
            .businesses
            .into_iter()
            .next()
            .map(|b| SourceRecord::Yelp(b.into())))
    }
}
