use std::sync::Arc;
use std::time::Duration;

use crate::cache::ConceptCache;
use crate::config::Config;
use crate::consolidation::ConsolidationService;
use crate::error::Result;
use crate::llm::LlmProvider;
use crate::matching::EntityMatcher;
use crate::models::Provider;
use crate::providers::{ProviderRateLimiter, SourceSet};
use crate::resolution::{ApiResolutionService, RoutingTable};
use crate::services::SuggestionService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub llm: LlmProvider,
    pub suggestions: Arc<SuggestionService>,
    /// Shared with every resolution call; one bucket per provider.
    pub rate_limiter: Arc<ProviderRateLimiter>,
    pub cache: Option<ConceptCache>,
    pub providers: Vec<Provider>,
}

impl AppState {
    /// Build HTTP clients and the LLM from configuration.
    pub fn from_config(config: Config) -> Result<Self> {
        let sources = SourceSet::from_config(
            &config.providers,
            Duration::from_millis(config.pipeline.provider_timeout_ms),
        )?;
        let llm = LlmProvider::new(config.llm.as_ref());
        Ok(Self::new(config, sources, llm))
    }

    pub fn new(config: Config, sources: SourceSet, llm: LlmProvider) -> Self {
        let config = Arc::new(config);
        let rate_limiter = Arc::new(ProviderRateLimiter::from_config(&config.providers));
        let cache = config.pipeline.cache_enabled.then(|| {
            ConceptCache::new(
                config.pipeline.cache_size,
                Duration::from_secs(config.pipeline.cache_ttl_secs),
            )
        });
        let providers = sources.providers();

        let resolver = ApiResolutionService::new(
            sources,
            RoutingTable::from_config(&config.routing),
            rate_limiter.clone(),
            Duration::from_millis(config.pipeline.provider_timeout_ms),
        );
        let consolidator = ConsolidationService::new(
            llm.clone(),
            Duration::from_millis(config.pipeline.llm_timeout_ms),
        );
        let suggestions = SuggestionService::new(
            resolver,
            EntityMatcher::new(config.matching.clone()),
            consolidator,
            llm.clone(),
            cache.clone(),
            &config.pipeline,
        );

        Self {
            config,
            llm,
            suggestions: Arc::new(suggestions),
            rate_limiter,
            cache,
            providers,
        }
    }
}
