// Shared fakes for the integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use async_trait::async_trait;

use wayfare::error::{Result, WayfareError};
use wayfare::models::{
    Coordinates, GooglePlace, PlaceCategory, PlaceConcept, Provider, SourceRecord, YelpBusiness,
    YelpCategory,
};
use wayfare::providers::PlaceSource;

static INIT: Once = Once::new();

/// Initialize tracing subscriber once for tests
pub fn init_test_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Place source that answers from a fixed position and fails for listed names.
pub struct ScriptedSource {
    provider: Provider,
    coordinates: Coordinates,
    /// Name the source reports instead of echoing the concept.
    spelling: Option<String>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(provider: Provider, lat: f64, lng: f64) -> Self {
        Self {
            provider,
            coordinates: Coordinates::new(lat, lng),
            spelling: None,
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn spelled(mut self, name: &str) -> Self {
        self.spelling = Some(name.to_string());
        self
    }

    pub fn failing_for(mut self, concept_name: &str) -> Self {
        self.failing.insert(concept_name.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlaceSource for ScriptedSource {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn search(&self, concept: &PlaceConcept) -> Result<Option<SourceRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&concept.name) {
            return Err(WayfareError::provider(
                self.provider,
                "HTTP 500: upstream down",
            ));
        }

        let name = self
            .spelling
            .clone()
            .unwrap_or_else(|| concept.name.clone());
        let id = format!(
            "{}-{}",
            self.provider,
            concept.name.to_lowercase().replace(' ', "-")
        );
        let record = match self.provider {
            Provider::Google => SourceRecord::Google(GooglePlace {
                place_id: id,
                name,
                formatted_address: Some("172 Boulevard Saint-Germain, 75006 Paris, France".into()),
                coordinates: Some(self.coordinates),
                rating: Some(4.2),
                user_ratings_total: Some(300),
                price_level: Some(2),
                types: vec!["cafe".into(), "food".into()],
                ..Default::default()
            }),
            _ => SourceRecord::Yelp(YelpBusiness {
                id,
                name,
                coordinates: Some(self.coordinates),
                address: Some("172 Bd Saint-Germain".into()),
                city: Some("Paris".into()),
                country: Some("FR".into()),
                rating: Some(4.0),
                review_count: Some(100),
                price: Some("$$".into()),
                categories: vec![YelpCategory {
                    alias: "cafes".into(),
                    title: "Cafes".into(),
                }],
                ..Default::default()
            }),
        };
        Ok(Some(record))
    }
}

pub fn cafe(name: &str) -> PlaceConcept {
    PlaceConcept::new(name, PlaceCategory::Cafe)
        .with_city("Paris")
        .with_coordinates(48.8541, 2.3326)
}

pub fn as_sources(sources: &[Arc<ScriptedSource>]) -> Vec<Arc<dyn PlaceSource>> {
    sources
        .iter()
        .map(|s| s.clone() as Arc<dyn PlaceSource>)
        .collect()
}
