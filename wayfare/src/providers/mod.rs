//! Upstream place and weather sources.
//!
//! The pipeline only sees the [`PlaceSource`] and [`WeatherSource`] traits;
//! the `reqwest` clients here are thin adapters that parse each provider's
//! JSON into the typed payloads in `models::source`.

mod amadeus;
mod google;
pub mod rate_limit;
mod weather;
mod yelp;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::config::ProvidersConfig;
use crate::error::{Result, WayfareError};
use crate::models::{Coordinates, PlaceConcept, Provider, SourceRecord, WeatherReport};

pub use amadeus::AmadeusClient;
pub use google::GooglePlacesClient;
pub use rate_limit::ProviderRateLimiter;
pub use weather::OpenWeatherClient;
pub use yelp::YelpClient;

/// Finds the single best candidate for a concept at one provider.
///
/// `Ok(None)` means the provider answered and had nothing; errors are
/// provider failures.
#[async_trait]
pub trait PlaceSource: Send + Sync {
    fn provider(&self) -> Provider;

    async fn search(&self, concept: &PlaceConcept) -> Result<Option<SourceRecord>>;
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn current(&self, coordinates: Coordinates) -> Result<Option<WeatherReport>>;
}

/// Configured sources, keyed by provider.
#[derive(Clone, Default)]
pub struct SourceSet {
    pub places: Vec<Arc<dyn PlaceSource>>,
    pub weather: Option<Arc<dyn WeatherSource>>,
}

impl SourceSet {
    pub fn get(&self, provider: Provider) -> Option<&Arc<dyn PlaceSource>> {
        self.places.iter().find(|s| s.provider() == provider)
    }

    pub fn providers(&self) -> Vec<Provider> {
        let mut providers: Vec<Provider> = self.places.iter().map(|s| s.provider()).collect();
        if self.weather.is_some() {
            providers.push(Provider::Weather);
        }
        providers
    }

    /// Build HTTP clients for every provider that has credentials.
    pub fn from_config(config: &ProvidersConfig, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("wayfare/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WayfareError::Config(format!("Failed to build HTTP client: {e}")))?;

        let mut set = SourceSet::default();

        for provider in [
            Provider::Google,
            Provider::Yelp,
            Provider::Amadeus,
            Provider::Weather,
        ] {
            if !config.is_configured(provider) {
                tracing::info!(%provider, "No credentials configured, provider disabled");
                continue;
            }
            let provider_config = config.get(provider);
            match provider {
                Provider::Google => set.places.push(Arc::new(GooglePlacesClient::new(
                    http.clone(),
                    provider_config,
                )?)),
                Provider::Yelp => set
                    .places
                    .push(Arc::new(YelpClient::new(http.clone(), provider_config)?)),
                Provider::Amadeus => set
                    .places
                    .push(Arc::new(AmadeusClient::new(http.clone(), provider_config)?)),
                Provider::Weather => {
                    set.weather = Some(Arc::new(OpenWeatherClient::new(
                        http.clone(),
                        provider_config,
                    )?))
                }
            }
        }

        Ok(set)
    }
}

/// Parse a provider response, mapping non-success statuses and bad JSON to
/// provider errors.
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: Provider,
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(200).collect();
        return Err(WayfareError::provider(
            provider,
            format!("HTTP {status}: {snippet}"),
        ));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| WayfareError::provider(provider, format!("Invalid response body: {e}")))
}

pub(crate) fn request_error(provider: Provider, error: reqwest::Error) -> WayfareError {
    WayfareError::provider(provider, format!("Request failed: {error}"))
}

/// Validate a provider base URL at construction.
pub(crate) fn base_url(provider: Provider, raw: &str) -> Result<String> {
    url::Url::parse(raw)
        .map_err(|e| WayfareError::Config(format!("Invalid {provider} base URL '{raw}': {e}")))?;
    Ok(raw.trim_end_matches('/').to_string())
}

pub(crate) fn required_key(provider: Provider, key: Option<&String>) -> Result<String> {
    key.cloned()
        .ok_or_else(|| WayfareError::Config(format!("{provider} API key is not configured")))
}

/// Free-text query for a concept: name plus its hint or city.
pub(crate) fn search_text(concept: &PlaceConcept) -> String {
    let hint = concept
        .search_hint
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .or_else(|| concept.location_display());

    match hint {
        Some(hint) => format!("{} {}", concept.name.trim(), hint),
        None => concept.name.trim().to_string(),
    }
}
