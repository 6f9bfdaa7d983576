mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use common::{as_sources, cafe, init_test_logger, ScriptedSource};
use wayfare::cache::ConceptCache;
use wayfare::config::{MatchingConfig, PipelineConfig};
use wayfare::consolidation::ConsolidationService;
use wayfare::error::WayfareError;
use wayfare::llm::LlmProvider;
use wayfare::matching::EntityMatcher;
use wayfare::models::{ConceptOutcome, Provider, UnresolvedReason};
use wayfare::providers::{ProviderRateLimiter, SourceSet};
use wayfare::resolution::{ApiResolutionService, RoutingTable};
use wayfare::services::{SuggestionOptions, SuggestionService};

// Flore and its Yelp twin sit roughly 19 m apart.
const FLORE: (f64, f64) = (48.8541, 2.3326);
const FLORE_YELP: (f64, f64) = (48.8542, 2.3328);

fn pipeline(sources: &[Arc<ScriptedSource>], cache: Option<ConceptCache>) -> SuggestionService {
    init_test_logger();
    let pipeline = PipelineConfig {
        max_batch_size: 5,
        max_concurrent_concepts: 2,
        ..Default::default()
    };
    let resolver = ApiResolutionService::new(
        SourceSet {
            places: as_sources(sources),
            weather: None,
        },
        RoutingTable::default(),
        Arc::new(ProviderRateLimiter::unlimited()),
        Duration::from_millis(500),
    );
    SuggestionService::new(
        resolver,
        EntityMatcher::new(MatchingConfig::default()),
        ConsolidationService::without_llm(),
        LlmProvider::unavailable("test"),
        cache,
        &pipeline,
    )
}

fn no_ai() -> SuggestionOptions {
    SuggestionOptions {
        use_ai: false,
        ..Default::default()
    }
}

#[tokio::test]
async fn nearby_records_with_accent_variants_merge_into_one_place() {
    let google = Arc::new(ScriptedSource::new(Provider::Google, FLORE.0, FLORE.1).spelled("Café de Flore"));
    let yelp = Arc::new(
        ScriptedSource::new(Provider::Yelp, FLORE_YELP.0, FLORE_YELP.1).spelled("Cafe de Flore"),
    );
    let service = pipeline(&[google, yelp], None);

    let batch = service
        .consolidate(&[cafe("Café de Flore")], no_ai())
        .await
        .expect("batch");

    assert_eq!(batch.results.len(), 1);
    let place = batch.results[0].place().expect("resolved");
    assert_eq!(place.canonical_name, "Café de Flore");
    assert_eq!(place.sources.len(), 2);
    assert_eq!(place.data_quality.source_count, 2);
    assert_eq!(place.city.as_deref(), Some("Paris"));
    assert_eq!(place.price_level, Some(2));
    assert_eq!(place.total_review_count, Some(400));
    let rating = place.aggregated_rating.expect("rating");
    assert!((rating - 4.15).abs() < 1e-9, "weighted rating was {rating}");
    assert!(place.match_confidence > 0.0 && place.match_confidence <= 1.0);
}

#[tokio::test]
async fn one_failing_concept_does_not_sink_the_batch() {
    let google = Arc::new(ScriptedSource::new(Provider::Google, FLORE.0, FLORE.1).failing_for("Les Deux Magots"));
    let yelp = Arc::new(
        ScriptedSource::new(Provider::Yelp, FLORE_YELP.0, FLORE_YELP.1).failing_for("Les Deux Magots"),
    );
    let service = pipeline(&[google, yelp], None);

    let concepts = vec![
        cafe("Café de Flore"),
        cafe("Les Deux Magots"),
        cafe("Café Kitsuné"),
    ];
    let batch = service.consolidate(&concepts, no_ai()).await.expect("batch");

    assert_eq!(batch.results.len(), 3);
    assert_eq!(
        batch.results[0].place().map(|p| p.canonical_name.as_str()),
        Some("Café de Flore")
    );
    assert_eq!(
        batch.results[2].place().map(|p| p.canonical_name.as_str()),
        Some("Café Kitsuné")
    );

    let ConceptOutcome::Unresolved {
        concept_name,
        reason,
        errors,
    } = &batch.results[1]
    else {
        panic!("expected the middle concept to be unresolved");
    };
    assert_eq!(concept_name, "Les Deux Magots");
    assert_eq!(*reason, UnresolvedReason::AllProvidersFailed);
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().any(|e| e.starts_with("yelp:")));

    assert_eq!(batch.summary.total, 3);
    assert_eq!(batch.summary.resolved, 2);
    assert_eq!(batch.summary.unresolved, 1);
    assert_eq!(
        batch.summary.providers_queried,
        vec![Provider::Google, Provider::Yelp]
    );
}

#[tokio::test]
async fn every_provider_failing_is_a_systemic_error() {
    let google = Arc::new(
        ScriptedSource::new(Provider::Google, FLORE.0, FLORE.1)
            .failing_for("Café de Flore")
            .failing_for("Les Deux Magots"),
    );
    let service = pipeline(&[google], None);

    let err = service
        .consolidate(&[cafe("Café de Flore"), cafe("Les Deux Magots")], no_ai())
        .await
        .unwrap_err();
    assert!(matches!(err, WayfareError::SystemicFailure));
}

#[tokio::test]
async fn oversized_batch_is_rejected_before_any_call() {
    let google = Arc::new(ScriptedSource::new(Provider::Google, FLORE.0, FLORE.1));
    let service = pipeline(&[google.clone()], None);

    let concepts: Vec<_> = (0..6).map(|i| cafe(&format!("Cafe {i}"))).collect();
    let err = service.consolidate(&concepts, no_ai()).await.unwrap_err();

    assert!(matches!(err, WayfareError::Validation { .. }));
    assert_eq!(google.calls(), 0);
}

#[tokio::test]
async fn repeated_concept_is_served_from_cache() {
    let google = Arc::new(ScriptedSource::new(Provider::Google, FLORE.0, FLORE.1));
    let cache = ConceptCache::new(16, Duration::from_secs(60));
    let service = pipeline(&[google.clone()], Some(cache.clone()));

    let first = service
        .consolidate(&[cafe("Café de Flore")], no_ai())
        .await
        .expect("first batch");
    assert_eq!(first.summary.cache_hits, 0);
    assert_eq!(google.calls(), 1);
    assert_eq!(cache.len(), 1);

    // Different spacing and case normalize to the same fingerprint.
    let second = service
        .consolidate(&[cafe("  café DE flore ")], no_ai())
        .await
        .expect("second batch");
    assert_eq!(second.summary.cache_hits, 1);
    assert!(second.results[0].is_cache_hit());
    assert_eq!(google.calls(), 1);
    assert_eq!(
        first.results[0].place().map(|p| p.id),
        second.results[0].place().map(|p| p.id)
    );
}

#[tokio::test]
async fn skip_cache_forces_a_fresh_lookup() {
    let google = Arc::new(ScriptedSource::new(Provider::Google, FLORE.0, FLORE.1));
    let service = pipeline(
        &[google.clone()],
        Some(ConceptCache::new(16, Duration::from_secs(60))),
    );

    service
        .consolidate(&[cafe("Café de Flore")], no_ai())
        .await
        .expect("first batch");
    let options = SuggestionOptions {
        skip_cache: true,
        ..no_ai()
    };
    let second = service
        .consolidate(&[cafe("Café de Flore")], options)
        .await
        .expect("second batch");

    assert_eq!(second.summary.cache_hits, 0);
    assert_eq!(google.calls(), 2);
}

#[tokio::test]
async fn cached_concept_survives_a_batch_where_providers_are_down() {
    let google = Arc::new(
        ScriptedSource::new(Provider::Google, FLORE.0, FLORE.1).failing_for("Les Deux Magots"),
    );
    let cache = ConceptCache::new(16, Duration::from_secs(60));
    let service = pipeline(&[google.clone()], Some(cache));

    service
        .consolidate(&[cafe("Café de Flore")], no_ai())
        .await
        .expect("warm-up batch");

    let batch = service
        .consolidate(&[cafe("Café de Flore"), cafe("Les Deux Magots")], no_ai())
        .await
        .expect("cached result keeps the batch alive");

    assert_eq!(batch.results.len(), 2);
    assert!(batch.results[0].is_cache_hit());
    assert_eq!(
        batch.results[0].place().map(|p| p.canonical_name.as_str()),
        Some("Café de Flore")
    );
    let ConceptOutcome::Unresolved { reason, .. } = &batch.results[1] else {
        panic!("expected the uncached concept to be unresolved");
    };
    assert_eq!(*reason, UnresolvedReason::AllProvidersFailed);
    assert_eq!(batch.summary.cache_hits, 1);
    assert_eq!(batch.summary.resolved, 1);
    assert_eq!(google.calls(), 2);
}

#[tokio::test]
async fn partially_failed_lookup_is_not_cached() {
    let google = Arc::new(
        ScriptedSource::new(Provider::Google, FLORE.0, FLORE.1).failing_for("Les Deux Magots"),
    );
    let yelp = Arc::new(ScriptedSource::new(Provider::Yelp, FLORE_YELP.0, FLORE_YELP.1));
    let cache = ConceptCache::new(16, Duration::from_secs(60));
    let service = pipeline(&[google.clone(), yelp.clone()], Some(cache.clone()));

    let first = service
        .consolidate(&[cafe("Les Deux Magots")], no_ai())
        .await
        .expect("first batch");
    let place = first.results[0].place().expect("yelp alone resolves it");
    assert_eq!(place.sources.len(), 1);
    assert_eq!(cache.len(), 0);

    let second = service
        .consolidate(&[cafe("Les Deux Magots")], no_ai())
        .await
        .expect("second batch");
    assert_eq!(second.summary.cache_hits, 0);
    assert_eq!(google.calls(), 2);
    assert_eq!(yelp.calls(), 2);
}
