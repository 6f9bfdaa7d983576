use serde::Serialize;
use std::collections::HashMap;
use std::env;

use crate::models::{PlaceCategory, Provider};

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt<T: std::str::FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Ignoring.", val, var, e);
                None
            }
        },
        Err(_) => None,
    }
}

/// Non-empty environment variable, trimmed.
fn env_secret(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse `ROUTE_<CATEGORY>` overrides.
/// Format: comma-separated provider names, e.g. `ROUTE_HOTEL=amadeus,google`
fn parse_route_overrides() -> HashMap<PlaceCategory, Vec<Provider>> {
    let mut overrides = HashMap::new();

    for category in PlaceCategory::ALL {
        let var = format!("ROUTE_{}", category.as_str().to_uppercase());
        let Ok(val) = env::var(&var) else {
            continue;
        };

        let providers: Vec<Provider> = val
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .filter_map(|name| match name.parse::<Provider>() {
                Ok(provider) if provider.is_place_provider() => Some(provider),
                Ok(provider) => {
                    tracing::warn!("{} is not a place provider in {}, skipping", provider, var);
                    None
                }
                Err(e) => {
                    tracing::warn!("{} in {}, skipping", e, var);
                    None
                }
            })
            .collect();

        overrides.insert(category, providers);
    }

    overrides
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub providers: ProvidersConfig,
    pub pipeline: PipelineConfig,
    pub matching: MatchingConfig,
    pub routing: RoutingConfig,
    pub llm: Option<LlmConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing)]
    pub api_keys: Vec<String>,
}

/// Credentials and limits for one upstream provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Only Amadeus uses a client secret (OAuth2 client credentials).
    #[serde(skip_serializing)]
    pub api_secret: Option<String>,
    pub base_url: String,
    pub rate_limit_per_minute: u32,
}

impl ProviderConfig {
    fn from_env(prefix: &str, default_base_url: &str, default_rate_limit: u32) -> Self {
        Self {
            api_key: env_secret(&format!("{prefix}_API_KEY")),
            api_secret: env_secret(&format!("{prefix}_API_SECRET")),
            base_url: env::var(format!("{prefix}_BASE_URL"))
                .unwrap_or_else(|_| default_base_url.to_string()),
            rate_limit_per_minute: parse_env_or(
                &format!("RATE_LIMIT_{prefix}"),
                default_rate_limit,
            ),
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            api_key: Some("test-key".to_string()),
            api_secret: Some("test-secret".to_string()),
            base_url: base_url.into(),
            rate_limit_per_minute: 6000,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvidersConfig {
    pub google: ProviderConfig,
    pub yelp: ProviderConfig,
    pub amadeus: ProviderConfig,
    pub weather: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get(&self, provider: Provider) -> &ProviderConfig {
        match provider {
            Provider::Google => &self.google,
            Provider::Yelp => &self.yelp,
            Provider::Amadeus => &self.amadeus,
            Provider::Weather => &self.weather,
        }
    }

    pub fn is_configured(&self, provider: Provider) -> bool {
        let config = self.get(provider);
        match provider {
            Provider::Amadeus => config.api_key.is_some() && config.api_secret.is_some(),
            _ => config.api_key.is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    pub max_batch_size: usize,
    pub max_concurrent_concepts: usize,
    pub provider_timeout_ms: u64,
    pub llm_timeout_ms: u64,
    pub cache_enabled: bool,
    pub cache_size: usize,
    pub cache_ttl_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 50,
            max_concurrent_concepts: 8,
            provider_timeout_ms: 5000,
            llm_timeout_ms: 8000,
            cache_enabled: true,
            cache_size: 1000,
            cache_ttl_secs: 3600,
        }
    }
}

/// Entity matching thresholds.
#[derive(Debug, Clone, Serialize)]
pub struct MatchingConfig {
    /// Within this distance coordinates count as a full match.
    pub strong_radius_m: f64,
    /// Beyond this distance two records are never the same place.
    pub weak_radius_m: f64,
    pub name_cutoff: f64,
    pub match_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            strong_radius_m: 100.0,
            weak_radius_m: 500.0,
            name_cutoff: 0.5,
            match_threshold: 0.6,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RoutingConfig {
    pub overrides: HashMap<PlaceCategory, Vec<Provider>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LlmConfig {
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Ask the model for a description when no provider supplied one.
    pub enrich_descriptions: bool,
    /// Ask the model to pick between conflicting provider addresses.
    pub resolve_address_conflicts: bool,
}

impl Default for Config {
    fn default() -> Self {
        let defaults = PipelineConfig::default();
        let matching = MatchingConfig::default();

        Self {
            server: ServerConfig {
                host: env::var("WAYFARE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("WAYFARE_PORT", 3000),
                api_keys: env::var("WAYFARE_API_KEYS")
                    .map(|keys| {
                        keys.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            providers: ProvidersConfig {
                google: ProviderConfig::from_env(
                    "GOOGLE",
                    "https://maps.googleapis.com/maps/api/place",
                    600,
                ),
                yelp: ProviderConfig::from_env("YELP", "https://api.yelp.com/v3", 300),
                amadeus: ProviderConfig::from_env("AMADEUS", "https://test.api.amadeus.com", 120),
                weather: ProviderConfig::from_env(
                    "OPENWEATHER",
                    "https://api.openweathermap.org/data/2.5",
                    60,
                ),
            },
            pipeline: PipelineConfig {
                max_batch_size: parse_env_or("MAX_BATCH_SIZE", defaults.max_batch_size),
                max_concurrent_concepts: parse_env_or(
                    "MAX_CONCURRENT_CONCEPTS",
                    defaults.max_concurrent_concepts,
                ),
                provider_timeout_ms: parse_env_or(
                    "PROVIDER_TIMEOUT_MS",
                    defaults.provider_timeout_ms,
                ),
                llm_timeout_ms: parse_env_or("LLM_CONSOLIDATION_TIMEOUT_MS", defaults.llm_timeout_ms),
                cache_enabled: parse_env_or("CONCEPT_CACHE_ENABLED", defaults.cache_enabled),
                cache_size: parse_env_or("CONCEPT_CACHE_SIZE", defaults.cache_size),
                cache_ttl_secs: parse_env_or("CONCEPT_CACHE_TTL_SECS", defaults.cache_ttl_secs),
            },
            matching: MatchingConfig {
                strong_radius_m: parse_env_or("MATCH_STRONG_RADIUS_M", matching.strong_radius_m),
                weak_radius_m: parse_env_or("MATCH_WEAK_RADIUS_M", matching.weak_radius_m),
                name_cutoff: parse_env_or("MATCH_NAME_CUTOFF", matching.name_cutoff),
                match_threshold: parse_env_or("MATCH_THRESHOLD", matching.match_threshold),
            },
            routing: RoutingConfig {
                overrides: parse_route_overrides(),
            },
            llm: env::var("LLM_MODEL").ok().map(|model| LlmConfig {
                model,
                api_key: env_secret("LLM_API_KEY"),
                base_url: env::var("LLM_BASE_URL").ok(),
                timeout_secs: parse_env_or("LLM_TIMEOUT", 30),
                max_retries: parse_env_or("LLM_MAX_RETRIES", 2),
                enrich_descriptions: parse_env_opt("LLM_ENRICH_DESCRIPTIONS").unwrap_or(true),
                resolve_address_conflicts: parse_env_opt("LLM_RESOLVE_ADDRESSES").unwrap_or(true),
            }),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn auth_enabled(&self) -> bool {
        !self.server.api_keys.is_empty()
    }
}

/// Known LLM providers that use OpenAI-compatible APIs
pub const KNOWN_LLM_PROVIDERS: &[&str] = &["openai", "openrouter", "ollama", "lmstudio"];

/// Parse an LLM model name into (provider, model) tuple.
pub fn parse_llm_provider_model(model: &str) -> (&str, &str) {
    if let Some((prefix, rest)) = model.split_once('/') {
        let prefix_lower = prefix.to_lowercase();
        if KNOWN_LLM_PROVIDERS.contains(&prefix_lower.as_str()) {
            return (prefix, rest);
        }
    }
    // Default to treating the whole string as a local model
    ("local", model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_pipeline_defaults() {
        for var in [
            "MAX_BATCH_SIZE",
            "MAX_CONCURRENT_CONCEPTS",
            "PROVIDER_TIMEOUT_MS",
        ] {
            std::env::remove_var(var);
        }

        let config = Config::default();
        assert_eq!(config.pipeline.max_batch_size, 50);
        assert_eq!(config.pipeline.max_concurrent_concepts, 8);
        assert_eq!(config.pipeline.provider_timeout_ms, 5000);
    }

    #[test]
    #[serial]
    fn test_invalid_env_value_falls_back_to_default() {
        std::env::set_var("MAX_BATCH_SIZE", "lots");
        let config = Config::default();
        assert_eq!(config.pipeline.max_batch_size, 50);
        std::env::remove_var("MAX_BATCH_SIZE");
    }

    #[test]
    #[serial]
    fn test_provider_credentials_from_env() {
        std::env::set_var("YELP_API_KEY", "  yelp-key ");
        std::env::set_var("AMADEUS_API_KEY", "client-id");
        std::env::remove_var("AMADEUS_API_SECRET");
        std::env::remove_var("GOOGLE_API_KEY");

        let config = Config::default();
        assert_eq!(config.providers.yelp.api_key.as_deref(), Some("yelp-key"));
        assert!(config.providers.is_configured(Provider::Yelp));
        assert!(!config.providers.is_configured(Provider::Google));
        assert!(
            !config.providers.is_configured(Provider::Amadeus),
            "amadeus needs both id and secret"
        );

        std::env::remove_var("YELP_API_KEY");
        std::env::remove_var("AMADEUS_API_KEY");
    }

    #[test]
    #[serial]
    fn test_route_overrides_skip_unknown_providers() {
        std::env::set_var("ROUTE_HOTEL", "amadeus, foursquare, weather");
        let config = Config::default();
        assert_eq!(
            config.routing.overrides.get(&PlaceCategory::Hotel),
            Some(&vec![Provider::Amadeus])
        );
        assert!(!config.routing.overrides.contains_key(&PlaceCategory::Bar));
        std::env::remove_var("ROUTE_HOTEL");
    }

    #[test]
    #[serial]
    fn test_llm_config_defaults() {
        std::env::remove_var("LLM_MODEL");
        let config = Config::default();
        assert!(config.llm.is_none());

        std::env::set_var("LLM_MODEL", "openai/gpt-4o-mini");
        let config = Config::default();
        let llm = config.llm.expect("llm config");
        assert_eq!(llm.model, "openai/gpt-4o-mini");
        assert!(llm.enrich_descriptions);
        std::env::remove_var("LLM_MODEL");
    }

    #[test]
    #[serial]
    fn test_api_keys_are_not_printed() {
        std::env::set_var("WAYFARE_API_KEYS", "alpha, beta,");
        let config = Config::default();
        assert_eq!(config.server.api_keys, vec!["alpha", "beta"]);
        let printed = serde_json::to_string(&config).expect("serialize");
        assert!(!printed.contains("alpha"));
        std::env::remove_var("WAYFARE_API_KEYS");
    }

    #[test]
    fn test_parse_llm_provider_model() {
        assert_eq!(
            parse_llm_provider_model("openai/gpt-4o-mini"),
            ("openai", "gpt-4o-mini")
        );
        assert_eq!(parse_llm_provider_model("llama3"), ("local", "llama3"));
    }
}
