use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::merge::{merge_group, Members};
use super::quality;
use super::ConsolidationError;
use crate::error::Result;
use crate::llm::prompts::{address_disambiguation_prompt, place_description_prompt};
use crate::llm::LlmProvider;
use crate::matching::normalize::address_similarity;
use crate::matching::MatchGroup;
use crate::models::{ConsolidatedPlace, PlaceConcept, SuggestionContext, WeatherReport};

/// Below this similarity two provider addresses are treated as conflicting.
const ADDRESS_CONFLICT_THRESHOLD: f64 = 0.5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceDescription {
    description: String,
    #[serde(default)]
    highlights: Vec<String>,
    #[serde(default)]
    best_for: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AddressChoice {
    index: Option<usize>,
    address: Option<String>,
}

/// Merges a match group into a canonical place, optionally polished by the LLM.
#[derive(Debug, Clone)]
pub struct ConsolidationService {
    llm: LlmProvider,
    llm_timeout: Duration,
    enrich_descriptions: bool,
    resolve_addresses: bool,
}

impl ConsolidationService {
    pub fn new(llm: LlmProvider, llm_timeout: Duration) -> Self {
        let (enrich_descriptions, resolve_addresses) = llm
            .config()
            .map(|c| (c.enrich_descriptions, c.resolve_address_conflicts))
            .unwrap_or((false, false));

        Self {
            llm,
            llm_timeout,
            enrich_descriptions,
            resolve_addresses,
        }
    }

    pub fn without_llm() -> Self {
        Self::new(LlmProvider::unavailable("disabled"), Duration::from_secs(1))
    }

    pub fn llm_available(&self) -> bool {
        self.llm.is_available()
    }

    pub async fn consolidate(
        &self,
        concept: &PlaceConcept,
        group: &MatchGroup,
        weather: Option<&WeatherReport>,
        use_ai: bool,
    ) -> std::result::Result<ConsolidatedPlace, ConsolidationError> {
        let mut place = merge_group(concept, group, weather)?;

        if !use_ai || !self.llm.is_available() {
            return Ok(place);
        }

        if self.resolve_addresses {
            let candidates = conflicting_addresses(&Members::of(group).addresses());
            if candidates.len() > 1 {
                if let Some(address) = self.pick_address(concept, &place, &candidates).await {
                    place.formatted_address = Some(address);
                }
            }
        }

        if self.enrich_descriptions && place.description.is_none() {
            if let Some(generated) = self.describe(concept, &place).await {
                place.description = Some(generated.description);
                let context = place
                    .suggestion_context
                    .get_or_insert_with(SuggestionContext::default);
                context.highlights = generated.highlights;
                context.best_for = generated.best_for;
            }
        }

        place.data_quality = quality::assess(&place, group);
        Ok(place)
    }

    async fn pick_address(
        &self,
        concept: &PlaceConcept,
        place: &ConsolidatedPlace,
        candidates: &[String],
    ) -> Option<String> {
        let prompt = address_disambiguation_prompt(
            &place.canonical_name,
            concept.location_display().as_deref(),
            candidates,
        );
        let choice: AddressChoice = self.ask(&prompt, "address").await?;

        let by_index = choice
            .index
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| candidates.get(i));
        let by_text = choice.address.as_deref().and_then(|chosen| {
            candidates
                .iter()
                .find(|c| c.trim().eq_ignore_ascii_case(chosen.trim()))
        });

        match by_index.or(by_text) {
            Some(address) => Some(address.clone()),
            None => {
                tracing::warn!(
                    place = %place.canonical_name,
                    "LLM picked an address outside the candidates, keeping provider priority"
                );
                None
            }
        }
    }

    async fn describe(
        &self,
        concept: &PlaceConcept,
        place: &ConsolidatedPlace,
    ) -> Option<PlaceDescription> {
        let prompt = place_description_prompt(
            &place.canonical_name,
            place.category,
            concept.location_display().as_deref(),
            &known_facts(place),
        );
        let generated: PlaceDescription = self.ask(&prompt, "description").await?;

        let description = generated.description.trim();
        if description.is_empty() {
            return None;
        }
        Some(PlaceDescription {
            description: description.to_string(),
            highlights: generated.highlights.into_iter().take(3).collect(),
            best_for: generated.best_for.into_iter().take(3).collect(),
        })
    }

    /// Bounded, failure-tolerant structured completion.
    async fn ask<T: DeserializeOwned>(&self, prompt: &str, purpose: &'static str) -> Option<T> {
        let call = self.llm.complete_structured::<T>(prompt);
        let outcome: Result<T> = match tokio::time::timeout(self.llm_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    purpose,
                    timeout_ms = self.llm_timeout.as_millis() as u64,
                    "LLM consolidation call timed out"
                );
                return None;
            }
        };

        match outcome {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(purpose, error = %e, "LLM consolidation call failed");
                None
            }
        }
    }
}

/// Distinct candidate addresses when the top-priority one disagrees with another.
fn conflicting_addresses(addresses: &[String]) -> Vec<String> {
    let Some(primary) = addresses.first() else {
        return Vec::new();
    };
    let conflict = addresses[1..]
        .iter()
        .any(|other| address_similarity(primary, other) < ADDRESS_CONFLICT_THRESHOLD);
    if !conflict {
        return Vec::new();
    }

    let mut distinct: Vec<String> = Vec::new();
    for address in addresses {
        if !distinct.iter().any(|d| address_similarity(d, address) >= 0.999) {
            distinct.push(address.clone());
        }
    }
    distinct
}

fn known_facts(place: &ConsolidatedPlace) -> Vec<String> {
    let mut facts = Vec::new();
    if let Some(sub) = &place.subcategory {
        facts.push(format!("Type: {sub}"));
    }
    if let Some(address) = &place.formatted_address {
        facts.push(format!("Address: {address}"));
    }
    if let (Some(rating), Some(reviews)) = (place.aggregated_rating, place.total_review_count) {
        facts.push(format!("Rated {rating:.1} from {reviews} reviews"));
    }
    if let Some(price) = &place.price_display {
        facts.push(format!("Price level: {price}"));
    }
    if let Some(hours) = place.hours.first() {
        facts.push(format!("Hours: {hours}"));
    }
    facts
}
