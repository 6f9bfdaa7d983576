use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;

use super::RoutingTable;
use crate::error::{Result, WayfareError};
use crate::models::{
    Coordinates, OutcomeStatus, PlaceCategory, PlaceConcept, Provider, ProviderOutcome,
    RawApiResults, SourceRecord, WeatherReport,
};
use crate::providers::{PlaceSource, ProviderRateLimiter, SourceSet};

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    pub include_weather: bool,
}

/// Calls the routed providers for a concept concurrently and collects
/// whatever they return. Provider failures never surface as errors here;
/// they become empty slots plus a failed [`ProviderOutcome`].
pub struct ApiResolutionService {
    sources: SourceSet,
    routing: RoutingTable,
    rate_limiter: Arc<ProviderRateLimiter>,
    timeout: Duration,
}

impl ApiResolutionService {
    pub fn new(
        sources: SourceSet,
        routing: RoutingTable,
        rate_limiter: Arc<ProviderRateLimiter>,
        timeout: Duration,
    ) -> Self {
        Self {
            sources,
            routing,
            rate_limiter,
            timeout,
        }
    }

    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    /// Configured sources for a category, in routing order.
    pub fn routed(&self, category: PlaceCategory) -> Vec<Arc<dyn PlaceSource>> {
        self.routing
            .providers_for(category)
            .iter()
            .filter_map(|provider| self.sources.get(*provider).cloned())
            .collect()
    }

    pub fn has_sources_for(&self, category: PlaceCategory) -> bool {
        !self.routed(category).is_empty()
    }

    pub async fn resolve(&self, concept: &PlaceConcept, options: ResolveOptions) -> RawApiResults {
        let started = Instant::now();
        let sources = self.routed(concept.category);
        let place_calls = join_all(sources.iter().map(|source| self.call_place(source, concept)));

        let weather_call = async {
            match (options.include_weather, concept.coordinates()) {
                (true, Some(coordinates)) => Some(self.call_weather(coordinates).await),
                _ => None,
            }
        };

        let (places, weather) = tokio::join!(place_calls, weather_call);

        let mut raw = RawApiResults::default();
        for (outcome, record) in places {
            raw.outcomes.push(outcome);
            if let Some(record) = record {
                raw.set(record);
            }
        }
        if let Some((outcome, report)) = weather {
            raw.outcomes.push(outcome);
            raw.weather = report;
        }

        tracing::debug!(
            concept = %concept.name,
            providers = sources.len(),
            found = raw.records().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Resolved concept"
        );
        raw
    }

    /// `SystemicFailure` when place providers were called and every one of
    /// those calls errored or timed out. Empty answers, throttled calls and
    /// weather do not count.
    pub fn check_systemic(results: &[RawApiResults]) -> Result<()> {
        let attempted: usize = results.iter().map(RawApiResults::attempted_place_calls).sum();
        let failed: usize = results.iter().map(RawApiResults::unreachable_place_calls).sum();

        if attempted > 0 && failed == attempted {
            tracing::error!(attempted, "Every place provider call in the batch failed");
            return Err(WayfareError::SystemicFailure);
        }
        Ok(())
    }

    /// Rate-limit permit, then the call itself, both bounded by the timeout.
    async fn guarded<T>(
        &self,
        provider: Provider,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        self.rate_limiter.acquire(provider, self.timeout).await?;
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| WayfareError::ProviderTimeout {
                provider,
                timeout_ms: self.timeout.as_millis() as u64,
            })?
    }

    async fn call_place(
        &self,
        source: &Arc<dyn PlaceSource>,
        concept: &PlaceConcept,
    ) -> (ProviderOutcome, Option<SourceRecord>) {
        let provider = source.provider();
        let started = Instant::now();
        let result = self.guarded(provider, source.search(concept)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(Some(record)) => (
                ProviderOutcome::new(provider, OutcomeStatus::Ok, elapsed_ms),
                Some(record),
            ),
            Ok(None) => (
                ProviderOutcome::new(provider, OutcomeStatus::Empty, elapsed_ms),
                None,
            ),
            Err(e) => {
                tracing::warn!(%provider, concept = %concept.name, elapsed_ms, error = %e, "Provider call failed");
                (failed_outcome(provider, elapsed_ms, &e), None)
            }
        }
    }

    async fn call_weather(&self, coordinates: Coordinates) -> (ProviderOutcome, Option<WeatherReport>) {
        let provider = Provider::Weather;
        let started = Instant::now();
        let Some(source) = self.sources.weather.as_ref() else {
            return (ProviderOutcome::new(provider, OutcomeStatus::Empty, 0), None);
        };

        let result = self.guarded(provider, source.current(coordinates)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(Some(report)) => (
                ProviderOutcome::new(provider, OutcomeStatus::Ok, elapsed_ms),
                Some(report),
            ),
            Ok(None) => (
                ProviderOutcome::new(provider, OutcomeStatus::Empty, elapsed_ms),
                None,
            ),
            Err(e) => {
                tracing::warn!(%provider, elapsed_ms, error = %e, "Weather lookup failed");
                (failed_outcome(provider, elapsed_ms, &e), None)
            }
        }
    }
}

fn failed_outcome(provider: Provider, elapsed_ms: u64, error: &WayfareError) -> ProviderOutcome {
    let status = match error {
        WayfareError::ProviderTimeout { .. } => OutcomeStatus::Timeout,
        WayfareError::RateLimited { .. } => OutcomeStatus::RateLimited,
        _ => OutcomeStatus::Failed,
    };
    ProviderOutcome::new(provider, status, elapsed_ms).with_error(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GooglePlace, YelpBusiness};
    use crate::providers::WeatherSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Hit,
        Empty,
        Fail,
        Hang,
    }

    struct FakeSource {
        provider: Provider,
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(provider: Provider, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                provider,
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PlaceSource for FakeSource {
        fn provider(&self) -> Provider {
            self.provider
        }

        async fn search(&self, concept: &PlaceConcept) -> Result<Option<SourceRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Hit => Ok(Some(match self.provider {
                    Provider::Google => SourceRecord::Google(GooglePlace {
                        place_id: "g".into(),
                        name: concept.name.clone(),
                        ..Default::default()
                    }),
                    _ => SourceRecord::Yelp(YelpBusiness {
                        id: "y".into(),
                        name: concept.name.clone(),
                        ..Default::default()
                    }),
                })),
                Behaviour::Empty => Ok(None),
                Behaviour::Fail => Err(WayfareError::provider(self.provider, "boom")),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(None)
                }
            }
        }
    }

    struct FixedWeather;

    #[async_trait]
    impl WeatherSource for FixedWeather {
        async fn current(&self, _coordinates: Coordinates) -> Result<Option<WeatherReport>> {
            Ok(Some(WeatherReport {
                temperature_c: 18.0,
                feels_like_c: None,
                condition: "Clouds".into(),
                description: None,
                humidity: None,
                wind_speed_ms: None,
                icon: None,
            }))
        }
    }

    fn service(places: Vec<Arc<dyn PlaceSource>>, weather: bool) -> ApiResolutionService {
        ApiResolutionService::new(
            SourceSet {
                places,
                weather: weather.then(|| Arc::new(FixedWeather) as Arc<dyn WeatherSource>),
            },
            RoutingTable::default(),
            Arc::new(ProviderRateLimiter::unlimited()),
            Duration::from_millis(50),
        )
    }

    #[tokio::test]
    async fn failures_and_timeouts_become_outcomes() {
        let service = service(
            vec![
                FakeSource::new(Provider::Google, Behaviour::Hang) as Arc<dyn PlaceSource>,
                FakeSource::new(Provider::Yelp, Behaviour::Fail),
            ],
            false,
        );
        let concept = PlaceConcept::new("Katz's", PlaceCategory::Restaurant);

        let raw = service.resolve(&concept, ResolveOptions::default()).await;
        assert!(raw.is_empty());

        let statuses: Vec<_> = raw.outcomes.iter().map(|o| (o.provider, o.status)).collect();
        assert!(statuses.contains(&(Provider::Google, OutcomeStatus::Timeout)));
        assert!(statuses.contains(&(Provider::Yelp, OutcomeStatus::Failed)));
        assert!(ApiResolutionService::check_systemic(&[raw]).is_err());
    }

    #[tokio::test]
    async fn only_routed_providers_are_called() {
        let google = FakeSource::new(Provider::Google, Behaviour::Hit);
        let yelp = FakeSource::new(Provider::Yelp, Behaviour::Hit);
        let service = service(vec![google.clone() as Arc<dyn PlaceSource>, yelp.clone()], false);

        // Hotels route to google and amadeus; yelp stays idle.
        let concept = PlaceConcept::new("Ritz", PlaceCategory::Hotel);
        let raw = service.resolve(&concept, ResolveOptions::default()).await;

        assert!(raw.google.is_some());
        assert_eq!(yelp.calls.load(Ordering::SeqCst), 0);
        assert_eq!(raw.outcomes.len(), 1);
    }

    #[tokio::test]
    async fn weather_needs_the_flag_and_coordinates() {
        let service = service(vec![FakeSource::new(Provider::Google, Behaviour::Empty) as Arc<dyn PlaceSource>], true);
        let with_coords =
            PlaceConcept::new("Louvre", PlaceCategory::Attraction).with_coordinates(48.86, 2.33);
        let without = PlaceConcept::new("Louvre", PlaceCategory::Attraction);
        let options = ResolveOptions {
            include_weather: true,
        };

        assert!(service.resolve(&with_coords, options).await.weather.is_some());
        assert!(service.resolve(&without, options).await.weather.is_none());
        assert!(service
            .resolve(&with_coords, ResolveOptions::default())
            .await
            .weather
            .is_none());
    }

    #[test]
    fn empty_answers_are_not_systemic() {
        let raw = RawApiResults {
            outcomes: vec![
                ProviderOutcome::new(Provider::Google, OutcomeStatus::Empty, 3),
                ProviderOutcome::new(Provider::Yelp, OutcomeStatus::Failed, 3),
            ],
            ..Default::default()
        };
        assert!(ApiResolutionService::check_systemic(&[raw]).is_ok());
        assert!(ApiResolutionService::check_systemic(&[]).is_ok());
    }

    #[tokio::test]
    async fn exhausted_rate_limit_is_reported() {
        let service = ApiResolutionService::new(
            SourceSet {
                places: vec![FakeSource::new(Provider::Google, Behaviour::Hit) as Arc<dyn PlaceSource>],
                weather: None,
            },
            RoutingTable::default(),
            Arc::new(ProviderRateLimiter::new([(Provider::Google, 1)])),
            Duration::from_millis(20),
        );
        let concept = PlaceConcept::new("Louvre", PlaceCategory::Attraction);

        let first = service.resolve(&concept, ResolveOptions::default()).await;
        let second = service.resolve(&concept, ResolveOptions::default()).await;

        assert_eq!(first.outcomes[0].status, OutcomeStatus::Ok);
        assert_eq!(second.outcomes[0].status, OutcomeStatus::RateLimited);
    }

    #[test]
    fn throttled_batch_is_not_systemic() {
        let throttled = || RawApiResults {
            outcomes: vec![
                ProviderOutcome::new(Provider::Google, OutcomeStatus::RateLimited, 0),
                ProviderOutcome::new(Provider::Yelp, OutcomeStatus::RateLimited, 0),
            ],
            ..Default::default()
        };
        assert!(ApiResolutionService::check_systemic(&[throttled(), throttled()]).is_ok());

        let mixed = RawApiResults {
            outcomes: vec![
                ProviderOutcome::new(Provider::Google, OutcomeStatus::Timeout, 500),
                ProviderOutcome::new(Provider::Yelp, OutcomeStatus::RateLimited, 0),
            ],
            ..Default::default()
        };
        assert!(ApiResolutionService::check_systemic(&[mixed]).is_ok());
    }
}
