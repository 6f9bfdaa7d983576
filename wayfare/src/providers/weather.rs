use async_trait::async_trait;
use serde::Deserialize;

use super::{base_url, read_json, request_error, required_key, WeatherSource};
use crate::config::ProviderConfig;
use crate::error::Result;
use crate::models::{Coordinates, Provider, WeatherReport};

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    #[serde(default)]
    weather: Vec<Condition>,
    main: Option<MainBlock>,
    wind: Option<Wind>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    main: String,
    description: Option<String>,
    icon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
    feels_like: Option<f64>,
    humidity: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: Option<f64>,
}

/// OpenWeather current conditions, metric units.
pub struct OpenWeatherClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenWeatherClient {
    pub fn new(http: reqwest::Client, config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            http,
            api_key: required_key(Provider::Weather, config.api_key.as_ref())?,
            base_url: base_url(Provider::Weather, &config.base_url)?,
        })
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn current(&self, coordinates: Coordinates) -> Result<Option<WeatherReport>> {
        let response = self
            .http
            .get(format!("{}/weather", self.base_url))
            .query(&[
                ("lat", coordinates.lat.to_string()),
                ("lon", coordinates.lng.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await
            .map_err(|e| request_error(Provider::Weather, e))?;
        let body: CurrentWeather = read_json(Provider::Weather, response).await?;

        // A report without a temperature is not worth attaching.
        let Some(main) = body.main else {
            return Ok(None);
        };
        let condition = body.weather.into_iter().next();

        Ok(Some(WeatherReport {
            temperature_c: main.temp,
            feels_like_c: main.feels_like,
            condition: condition
                .as_ref()
                .map(|c| c.main.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            description: condition.as_ref().and_then(|c| c.description.clone()),
            humidity: main.humidity,
            wind_speed_ms: body.wind.and_then(|w| w.speed),
            icon: condition.and_then(|c| c.icon),
        }))
    }
}
