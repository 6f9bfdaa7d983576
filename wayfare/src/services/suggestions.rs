use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde::Deserialize;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::cache::{fingerprint, ConceptCache};
use crate::config::PipelineConfig;
use crate::consolidation::ConsolidationService;
use crate::error::{FieldError, Result, WayfareError};
use crate::llm::prompts::concept_generation_prompt;
use crate::llm::LlmProvider;
use crate::matching::EntityMatcher;
use crate::models::{
    ConceptLocation, ConceptOutcome, ConsolidatedPlace, PlaceCategory, PlaceConcept, Provider,
    RawApiResults, SuggestionContext, UnresolvedReason,
};
use crate::resolution::{ApiResolutionService, ResolveOptions};

pub const MAX_GENERATED_CONCEPTS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestionOptions {
    pub include_weather: bool,
    pub use_ai: bool,
    pub skip_cache: bool,
}

impl Default for SuggestionOptions {
    fn default() -> Self {
        Self {
            include_weather: false,
            use_ai: true,
            skip_cache: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub cache_hits: usize,
    pub providers_queried: Vec<Provider>,
    pub timing_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub results: Vec<ConceptOutcome>,
    pub summary: BatchSummary,
}

impl BatchResult {
    fn empty(started: Instant) -> Self {
        Self {
            results: Vec::new(),
            summary: BatchSummary {
                total: 0,
                resolved: 0,
                unresolved: 0,
                cache_hits: 0,
                providers_queried: Vec::new(),
                timing_ms: started.elapsed().as_millis() as u64,
            },
        }
    }
}

/// Input for query-driven generation.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub query: String,
    pub location: Option<String>,
    pub categories: Vec<PlaceCategory>,
    pub limit: usize,
    pub options: SuggestionOptions,
}

#[derive(Debug, Deserialize)]
struct GeneratedPlaces {
    #[serde(default)]
    places: Vec<GeneratedPlace>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedPlace {
    name: String,
    category: String,
    search_hint: Option<String>,
}

/// Where a concept stands after the resolution phase.
enum Stage {
    Cached(ConsolidatedPlace),
    Fetched(RawApiResults),
    Unrouted,
}

/// Drives concepts through resolution, matching and consolidation.
pub struct SuggestionService {
    resolver: ApiResolutionService,
    matcher: EntityMatcher,
    consolidator: ConsolidationService,
    cache: Option<ConceptCache>,
    llm: LlmProvider,
    max_batch_size: usize,
    max_concurrent: usize,
    llm_timeout: Duration,
}

impl SuggestionService {
    pub fn new(
        resolver: ApiResolutionService,
        matcher: EntityMatcher,
        consolidator: ConsolidationService,
        llm: LlmProvider,
        cache: Option<ConceptCache>,
        pipeline: &PipelineConfig,
    ) -> Self {
        Self {
            resolver,
            matcher,
            consolidator,
            cache,
            llm,
            max_batch_size: pipeline.max_batch_size,
            max_concurrent: pipeline.max_concurrent_concepts.max(1),
            llm_timeout: Duration::from_millis(pipeline.llm_timeout_ms),
        }
    }

    pub fn cache(&self) -> Option<&ConceptCache> {
        self.cache.as_ref()
    }

    pub fn resolver(&self) -> &ApiResolutionService {
        &self.resolver
    }

    pub fn llm(&self) -> &LlmProvider {
        &self.llm
    }

    /// Reject the whole batch before any provider is called.
    pub fn validate(&self, concepts: &[PlaceConcept]) -> Result<()> {
        if concepts.is_empty() {
            return Err(WayfareError::invalid_fields(vec![FieldError::new(
                "concepts",
                "must contain at least one concept",
            )]));
        }
        if concepts.len() > self.max_batch_size {
            return Err(WayfareError::invalid_fields(vec![FieldError::new(
                "concepts",
                format!(
                    "batch of {} exceeds the maximum of {}",
                    concepts.len(),
                    self.max_batch_size
                ),
            )]));
        }

        let mut fields = Vec::new();
        for (index, concept) in concepts.iter().enumerate() {
            if let Err(errors) = concept.validate() {
                flatten_errors(&format!("concepts[{index}]"), &errors, &mut fields);
            }
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(WayfareError::invalid_fields(fields))
        }
    }

    /// Resolve and consolidate a batch. Results keep input order, one per concept.
    pub async fn consolidate(
        &self,
        concepts: &[PlaceConcept],
        options: SuggestionOptions,
    ) -> Result<BatchResult> {
        self.validate(concepts)?;
        let started = Instant::now();
        let resolve = ResolveOptions {
            include_weather: options.include_weather,
        };

        let lookups: Vec<_> = concepts
            .iter()
            .map(|concept| self.resolve_stage(concept, options, resolve))
            .collect();
        let stages: Vec<Stage> = stream::iter(lookups)
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let fetched: Vec<RawApiResults> = stages
            .iter()
            .filter_map(|stage| match stage {
                Stage::Fetched(raw) => Some(raw.clone()),
                _ => None,
            })
            .collect();
        // A cached answer means the batch is not a total loss.
        if !stages.iter().any(|stage| matches!(stage, Stage::Cached(_))) {
            ApiResolutionService::check_systemic(&fetched)?;
        }

        let providers_queried: BTreeSet<Provider> = fetched
            .iter()
            .flat_map(|raw| raw.outcomes.iter().map(|o| o.provider))
            .collect();

        let merges: Vec<_> = concepts
            .iter()
            .zip(stages)
            .map(|(concept, stage)| self.finish(concept, stage, options))
            .collect();
        let results: Vec<ConceptOutcome> = stream::iter(merges)
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let resolved = results.iter().filter(|r| r.is_resolved()).count();
        let summary = BatchSummary {
            total: results.len(),
            resolved,
            unresolved: results.len() - resolved,
            cache_hits: results.iter().filter(|r| r.is_cache_hit()).count(),
            providers_queried: providers_queried.into_iter().collect(),
            timing_ms: started.elapsed().as_millis() as u64,
        };

        tracing::info!(
            total = summary.total,
            resolved = summary.resolved,
            cache_hits = summary.cache_hits,
            elapsed_ms = summary.timing_ms,
            "Consolidated suggestion batch"
        );

        Ok(BatchResult { results, summary })
    }

    /// Ask the LLM for concepts matching a free-text query, then consolidate them.
    ///
    /// A failed or unparseable completion yields an empty result rather than an
    /// error; only a missing LLM is reported.
    pub async fn generate(&self, request: GenerateRequest) -> Result<BatchResult> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(WayfareError::invalid_fields(vec![FieldError::new(
                "query",
                "must not be empty",
            )]));
        }
        if !(1..=MAX_GENERATED_CONCEPTS).contains(&request.limit) {
            return Err(WayfareError::invalid_fields(vec![FieldError::new(
                "limit",
                format!("must be between 1 and {MAX_GENERATED_CONCEPTS}"),
            )]));
        }
        if !self.llm.is_available() {
            return Err(WayfareError::LlmUnavailable(
                "query-driven suggestions need a configured LLM".to_string(),
            ));
        }

        let started = Instant::now();
        let concepts = self.generate_concepts(query, &request).await;
        if concepts.is_empty() {
            return Ok(BatchResult::empty(started));
        }

        self.consolidate(&concepts, request.options).await
    }

    async fn generate_concepts(&self, query: &str, request: &GenerateRequest) -> Vec<PlaceConcept> {
        let location = request
            .location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty());
        let prompt =
            concept_generation_prompt(query, location, &request.categories, request.limit);

        let generated = match tokio::time::timeout(
            self.llm_timeout,
            self.llm.complete_structured::<GeneratedPlaces>(&prompt),
        )
        .await
        {
            Ok(Ok(generated)) => generated,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Concept generation failed");
                return Vec::new();
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.llm_timeout.as_millis() as u64,
                    "Concept generation timed out"
                );
                return Vec::new();
            }
        };

        let concepts: Vec<PlaceConcept> = generated
            .places
            .into_iter()
            .filter_map(|place| {
                let category = place.category.parse::<PlaceCategory>().ok()?;
                if !request.categories.is_empty() && !request.categories.contains(&category) {
                    return None;
                }
                let concept = PlaceConcept {
                    name: place.name.trim().to_string(),
                    category,
                    search_hint: place.search_hint.filter(|h| !h.trim().is_empty()),
                    location: location.map(|l| ConceptLocation {
                        city: Some(l.to_string()),
                        ..Default::default()
                    }),
                    context: None,
                };
                concept.validate().is_ok().then_some(concept)
            })
            .take(request.limit)
            .collect();

        tracing::debug!(query, generated = concepts.len(), "Generated place concepts");
        concepts
    }

    async fn resolve_stage(
        &self,
        concept: &PlaceConcept,
        options: SuggestionOptions,
        resolve: ResolveOptions,
    ) -> Stage {
        if !options.skip_cache {
            if let Some(cache) = &self.cache {
                if let Some(mut place) = cache.get(&fingerprint(concept, options.include_weather)) {
                    tracing::debug!(concept = %concept.name, "Concept cache hit");
                    refresh_context(&mut place, concept);
                    return Stage::Cached(place);
                }
            }
        }

        if !self.resolver.has_sources_for(concept.category) {
            return Stage::Unrouted;
        }
        Stage::Fetched(self.resolver.resolve(concept, resolve).await)
    }

    async fn finish(
        &self,
        concept: &PlaceConcept,
        stage: Stage,
        options: SuggestionOptions,
    ) -> ConceptOutcome {
        let raw = match stage {
            Stage::Cached(place) => {
                return ConceptOutcome::Resolved {
                    place: Box::new(place),
                    cache_hit: true,
                }
            }
            Stage::Unrouted => {
                return ConceptOutcome::unresolved(
                    &concept.name,
                    UnresolvedReason::NoProvidersConfigured,
                    Vec::new(),
                )
            }
            Stage::Fetched(raw) => raw,
        };

        let errors = raw.errors();
        if raw.is_empty() {
            let reason = if raw.attempted_place_calls() > 0
                && raw.failed_place_calls() == raw.attempted_place_calls()
            {
                UnresolvedReason::AllProvidersFailed
            } else {
                UnresolvedReason::NoData
            };
            return ConceptOutcome::unresolved(&concept.name, reason, errors);
        }

        let groups = self.matcher.group(&raw);
        let Some(primary) = self.matcher.select_primary(concept, groups) else {
            return ConceptOutcome::unresolved(&concept.name, UnresolvedReason::NoData, errors);
        };

        match self
            .consolidator
            .consolidate(concept, &primary, raw.weather.as_ref(), options.use_ai)
            .await
        {
            Ok(place) => {
                // Degraded answers are served once but never cached.
                if raw.failed_place_calls() == 0 {
                    if let Some(cache) = &self.cache {
                        cache.put(fingerprint(concept, options.include_weather), place.clone());
                    }
                }
                ConceptOutcome::resolved(place)
            }
            Err(e) => {
                tracing::warn!(concept = %concept.name, error = %e, "Consolidation produced no place");
                ConceptOutcome::unresolved(&concept.name, UnresolvedReason::NoData, errors)
            }
        }
    }
}

/// Cached places keep their enrichment but take the caller's trip context.
fn refresh_context(place: &mut ConsolidatedPlace, concept: &PlaceConcept) {
    let (highlights, best_for) = place
        .suggestion_context
        .take()
        .map(|c| (c.highlights, c.best_for))
        .unwrap_or_default();

    let mut context = concept
        .context
        .as_ref()
        .map(SuggestionContext::from)
        .unwrap_or_default();
    context.highlights = highlights;
    context.best_for = best_for;

    place.suggestion_context = (context != SuggestionContext::default()).then_some(context);
}

/// `concepts[3].location.coordinates.lat`-style paths for every failure.
fn flatten_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let path = format!("{prefix}.{field}");
        match kind {
            ValidationErrorsKind::Field(failures) => {
                for failure in failures {
                    let message = failure
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("failed '{}' validation", failure.code));
                    out.push(FieldError::new(path.clone(), message));
                }
            }
            ValidationErrorsKind::Struct(nested) => flatten_errors(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    flatten_errors(&format!("{path}[{index}]"), nested, out);
                }
            }
        }
    }
    out.sort_by(|a, b| a.field.cmp(&b.field));
}
