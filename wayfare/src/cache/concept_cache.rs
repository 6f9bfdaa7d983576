use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::matching::normalize::{fold, normalize_name};
use crate::models::{ConsolidatedPlace, PlaceConcept};

struct Entry {
    place: ConsolidatedPlace,
    inserted_at: Instant,
}

/// Thread-safe LRU cache of consolidated places with a time-to-live.
///
/// Keys come from [`fingerprint`], so two requests for the same place in the
/// same area share an entry even when spelled slightly differently.
#[derive(Clone)]
pub struct ConceptCache {
    cache: Arc<Mutex<LruCache<String, Entry>>>,
    ttl: Duration,
}

impl std::fmt::Debug for ConceptCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConceptCache")
            .field("len", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl ConceptCache {
    /// A zero capacity is bumped to one entry.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Entry>> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Fresh entry for `key`; expired entries are evicted on read.
    pub fn get(&self, key: &str) -> Option<ConsolidatedPlace> {
        let mut cache = self.lock();
        let expired = match cache.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => {
                return Some(entry.place.clone())
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            cache.pop(key);
        }
        None
    }

    pub fn put(&self, key: String, place: ConsolidatedPlace) {
        self.lock().put(
            key,
            Entry {
                place,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Stable cache key for a concept.
///
/// Normalized name, category and either coordinates rounded to two decimals
/// (about 1 km) or the folded city. Weather is part of the key because a
/// cached place carries the conditions it was fetched with.
pub fn fingerprint(concept: &PlaceConcept, include_weather: bool) -> String {
    let area = match concept.coordinates() {
        Some(c) => format!("{:.2},{:.2}", c.lat, c.lng),
        None => concept.city().map(fold).unwrap_or_default(),
    };
    let material = format!(
        "{}|{}|{}|{}",
        normalize_name(&concept.name),
        concept.category.as_str(),
        area,
        include_weather
    );

    let digest = Sha256::digest(material.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
