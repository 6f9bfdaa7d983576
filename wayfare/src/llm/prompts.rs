//! Prompt templates for LLM-assisted consolidation and concept generation.
//!
//! Templates use plain `format!()` interpolation; every prompt asks for a
//! single JSON object so responses can go through `complete_structured`.

use crate::models::PlaceCategory;

/// Prompt for a short traveller-facing description of a consolidated place.
///
/// Expected response: `{"canonicalName", "description", "highlights", "bestFor"}`.
///
/// # Example
/// ```
/// use wayfare::llm::prompts::place_description_prompt;
/// use wayfare::models::PlaceCategory;
///
/// let prompt = place_description_prompt(
///     "Le Bernardin",
///     PlaceCategory::Restaurant,
///     Some("New York, USA"),
///     &["Rated 4.7 from 3000 reviews".to_string()],
/// );
/// assert!(prompt.contains("Le Bernardin"));
/// assert!(prompt.contains("restaurant"));
/// ```
pub fn place_description_prompt(
    name: &str,
    category: PlaceCategory,
    location: Option<&str>,
    facts: &[String],
) -> String {
    let location = location.unwrap_or("unknown");
    let facts = if facts.is_empty() {
        "- (no additional facts)".to_string()
    } else {
        facts
            .iter()
            .map(|fact| format!("- {fact}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"You are writing a listing for a travel itinerary.

Place: {name}
Category: {category}
Location: {location}
Known facts from data providers:
{facts}

Write a factual description in at most two sentences. Only use the facts above and
widely known public information about this exact place. Do not invent prices or hours.

Respond with valid JSON only:
{{"canonicalName": "official name of the place", "description": "...", "highlights": ["up to 3 short highlights"], "bestFor": ["up to 3 kinds of traveller or occasion"]}}"#
    )
}

/// Prompt asking the model to pick the correct address when providers disagree.
///
/// Expected response: `{"address": "...", "index": <candidate number>}`.
pub fn address_disambiguation_prompt(
    name: &str,
    location: Option<&str>,
    candidates: &[String],
) -> String {
    let location = location.unwrap_or("unknown");
    let listed = candidates
        .iter()
        .enumerate()
        .map(|(i, address)| format!("{}. {address}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Several data providers returned different addresses for the same place.

Place: {name}
City: {location}
Candidate addresses:
{listed}

Choose the candidate that is the place's current street address. Do not write a new address.

Respond with valid JSON only:
{{"index": 1, "address": "the chosen candidate, copied exactly"}}"#
    )
}

/// Prompt turning a free-text trip request into concrete place concepts.
///
/// Expected response: `{"places": [{"name", "category", "searchHint"}]}`.
///
/// # Example
/// ```
/// use wayfare::llm::prompts::concept_generation_prompt;
/// use wayfare::models::PlaceCategory;
///
/// let prompt = concept_generation_prompt(
///     "romantic dinner spots",
///     Some("Paris"),
///     &[PlaceCategory::Restaurant],
///     5,
/// );
/// assert!(prompt.contains("romantic dinner spots"));
/// assert!(prompt.contains("exactly 5"));
/// ```
pub fn concept_generation_prompt(
    query: &str,
    location: Option<&str>,
    categories: &[PlaceCategory],
    limit: usize,
) -> String {
    let location = location
        .map(|l| format!("in or near {l}"))
        .unwrap_or_else(|| "anywhere that fits the request".to_string());

    let allowed = if categories.is_empty() {
        PlaceCategory::ALL
            .iter()
            .map(PlaceCategory::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        categories
            .iter()
            .map(PlaceCategory::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        r#"Suggest real, currently operating places for this travel request.

Request: {query}
Where: {location}
Allowed categories: {allowed}

Return exactly {limit} distinct places. Use each place's official name so it can be
found on Google Maps or Yelp. The search hint should name the neighbourhood or city.

Respond with valid JSON only:
{{"places": [{{"name": "Place name", "category": "one of the allowed categories", "searchHint": "neighbourhood, city"}}]}}"#
    )
}
