use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::{base_url, read_json, request_error, required_key, PlaceSource};
use crate::config::ProviderConfig;
use crate::error::Result;
use crate::matching::normalize::name_similarity;
use crate::models::{
    AmadeusKind, AmadeusOffer, Coordinates, Money, PlaceCategory, PlaceConcept, Provider,
    SourceRecord,
};

const SEARCH_RADIUS_KM: u32 = 1;
/// Refresh tokens this long before Amadeus says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Hotel {
    hotel_id: String,
    name: String,
    geo_code: Option<GeoCode>,
    address: Option<HotelAddress>,
    rating: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HotelAddress {
    #[serde(default)]
    lines: Vec<String>,
    city_name: Option<String>,
    country_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Activity {
    id: String,
    name: String,
    short_description: Option<String>,
    description: Option<String>,
    geo_code: Option<GeoCode>,
    price: Option<ActivityPrice>,
    #[serde(default)]
    pictures: Vec<String>,
    booking_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityPrice {
    amount: Option<String>,
    currency_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeoCode {
    latitude: f64,
    longitude: f64,
}

impl From<Hotel> for AmadeusOffer {
    fn from(hotel: Hotel) -> Self {
        let address = hotel.address.and_then(|a| {
            let mut parts = a.lines;
            parts.extend(a.city_name);
            parts.extend(a.country_code);
            let joined = parts
                .into_iter()
                .filter(|p| !p.trim().is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            (!joined.is_empty()).then_some(joined)
        });

        AmadeusOffer {
            id: hotel.hotel_id,
            kind: AmadeusKind::Hotel,
            name: hotel.name,
            coordinates: hotel
                .geo_code
                .map(|g| Coordinates::new(g.latitude, g.longitude)),
            address,
            description: None,
            price: None,
            booking_link: None,
            pictures: Vec::new(),
            stars: hotel.rating.and_then(|r| r.trim().parse().ok()),
        }
    }
}

impl From<Activity> for AmadeusOffer {
    fn from(activity: Activity) -> Self {
        let price = activity.price.and_then(|p| {
            let amount = p.amount?.parse::<f64>().ok()?;
            Some(Money::new(amount, p.currency_code.unwrap_or_else(|| "EUR".to_string())))
        });

        AmadeusOffer {
            id: activity.id,
            kind: AmadeusKind::Activity,
            name: activity.name,
            coordinates: activity
                .geo_code
                .map(|g| Coordinates::new(g.latitude, g.longitude)),
            address: None,
            description: activity
                .short_description
                .or(activity.description)
                .filter(|d| !d.trim().is_empty()),
            price,
            booking_link: activity.booking_link,
            pictures: activity.pictures,
            stars: None,
        }
    }
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Amadeus Self-Service: hotel list by geocode and tours & activities.
pub struct AmadeusClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    base_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl AmadeusClient {
    pub fn new(http: reqwest::Client, config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            http,
            client_id: required_key(Provider::Amadeus, config.api_key.as_ref())?,
            client_secret: required_key(Provider::Amadeus, config.api_secret.as_ref())?,
            base_url: base_url(Provider::Amadeus, &config.base_url)?,
            token: Mutex::new(None),
        })
    }

    /// OAuth2 client-credentials token, cached until shortly before expiry.
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .http
            .post(format!("{}/v1/security/oauth2/token", self.base_url))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| request_error(Provider::Amadeus, e))?;
        let token: TokenResponse = read_json(Provider::Amadeus, response).await?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        tracing::debug!(expires_in = token.expires_in, "Refreshed Amadeus access token");

        Ok(token.access_token)
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        coordinates: Coordinates,
        extra: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let token = self.access_token().await?;
        let mut query: Vec<(&str, String)> = vec![
            ("latitude", coordinates.lat.to_string()),
            ("longitude", coordinates.lng.to_string()),
            ("radius", SEARCH_RADIUS_KM.to_string()),
        ];
        query.extend(extra.iter().map(|(k, v)| (*k, v.to_string())));

        let response = self
            .http
            .get(format!("{}{}", self.base_url, endpoint))
            .bearer_auth(token)
            .query(&query)
            .send()
            .await
            .map_err(|e| request_error(Provider::Amadeus, e))?;

        // Amadeus answers "nothing nearby" with 404 on some endpoints.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let body: DataResponse<T> = read_json(Provider::Amadeus, response).await?;
        Ok(body.data)
    }
}

fn best_by_name(concept: &PlaceConcept, offers: Vec<AmadeusOffer>) -> Option<AmadeusOffer> {
    offers
        .into_iter()
        .map(|o| (name_similarity(&concept.name, &o.name), o))
        .filter(|(score, _)| *score > 0.0)
        .max_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, o)| o)
}

#[async_trait]
impl PlaceSource for AmadeusClient {
    fn provider(&self) -> Provider {
        Provider::Amadeus
    }

    async fn search(&self, concept: &PlaceConcept) -> Result<Option<SourceRecord>> {
        let Some(coordinates) = concept.coordinates() else {
            tracing::debug!(concept = %concept.name, "Skipping Amadeus search without coordinates");
            return Ok(None);
        };

        let offers: Vec<AmadeusOffer> = match concept.category {
            PlaceCategory::Hotel => self
                .fetch::<Hotel>(
                    "/v1/reference-data/locations/hotels/by-geocode",
                    coordinates,
                    &[("radiusUnit", "KM")],
                )
                .await?
                .into_iter()
                .map(AmadeusOffer::from)
                .collect(),
            PlaceCategory::Attraction | PlaceCategory::Activity | PlaceCategory::Transport => self
                .fetch::<Activity>("/v1/shopping/activities", coordinates, &[])
                .await?
                .into_iter()
                .map(AmadeusOffer::from)
                .collect(),
            other => {
                tracing::debug!(category = %other, "No Amadeus catalogue for category");
                return Ok(None);
            }
        };

        Ok(best_by_name(concept, offers).map(SourceRecord::Amadeus))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> AmadeusClient {
        AmadeusClient::new(
            reqwest::Client::new(),
            &ProviderConfig::with_base_url(server.uri()),
        )
        .expect("client")
    }

    async fn mount_token(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/v1/security/oauth2/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "type": "amadeusOAuth2Token",
                "access_token": "tok-123",
                "expires_in": 1799
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn hotel_search_picks_closest_name_and_reuses_token() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/v1/reference-data/locations/hotels/by-geocode"))
            .and(header("authorization", "Bearer tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"hotelId": "PAR1", "name": "HOTEL DU LOUVRE", "geoCode": {"latitude": 48.86, "longitude": 2.33}},
                    {"hotelId": "PAR2", "name": "RITZ PARIS", "geoCode": {"latitude": 48.868, "longitude": 2.329},
                     "address": {"lines": ["15 PLACE VENDOME"], "cityName": "PARIS", "countryCode": "FR"}, "rating": "5"}
                ]
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let concept =
            PlaceConcept::new("Ritz Paris", PlaceCategory::Hotel).with_coordinates(48.868, 2.329);

        for _ in 0..2 {
            let record = client.search(&concept).await.expect("search").expect("hit");
            let SourceRecord::Amadeus(offer) = record else {
                panic!("expected amadeus record");
            };
            assert_eq!(offer.id, "PAR2");
            assert_eq!(offer.stars, Some(5));
            assert_eq!(offer.address.as_deref(), Some("15 PLACE VENDOME, PARIS, FR"));
        }
    }

    #[tokio::test]
    async fn activity_price_is_parsed() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(path("/v1/shopping/activities"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{
                    "id": "4191",
                    "name": "Skip-the-line Louvre Museum tour",
                    "shortDescription": "See the Mona Lisa without the queue.",
                    "geoCode": {"latitude": 48.8606, "longitude": 2.3376},
                    "price": {"amount": "65.00", "currencyCode": "EUR"},
                    "pictures": ["https://images.example/louvre.jpg"],
                    "bookingLink": "https://book.example/4191"
                }]
            })))
            .mount(&server)
            .await;

        let concept = PlaceConcept::new("Louvre Museum", PlaceCategory::Attraction)
            .with_coordinates(48.8606, 2.3376);
        let record = client(&server).search(&concept).await.expect("search").expect("hit");
        let SourceRecord::Amadeus(offer) = record else {
            panic!("expected amadeus record");
        };
        assert_eq!(offer.kind, AmadeusKind::Activity);
        assert_eq!(offer.price, Some(Money::new(65.0, "EUR")));
        assert_eq!(offer.booking_link.as_deref(), Some("https://book.example/4191"));
    }

    #[tokio::test]
    async fn not_found_means_no_results() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(path("/v1/shopping/activities"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let concept =
            PlaceConcept::new("Hidden", PlaceCategory::Activity).with_coordinates(1.0, 1.0);
        assert!(client(&server).search(&concept).await.expect("search").is_none());
    }

    #[tokio::test]
    async fn missing_coordinates_skip_the_call() {
        let server = MockServer::start().await;
        mount_token(&server, 0).await;

        let concept = PlaceConcept::new("Ritz Paris", PlaceCategory::Hotel);
        assert!(client(&server).search(&concept).await.expect("search").is_none());
    }
}
