//! Field-by-field merge of a match group into a canonical place.

use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use super::quality;
use super::ConsolidationError;
use crate::matching::normalize::phone_key;
use crate::matching::MatchGroup;
use crate::models::{
    AmadeusOffer, ConsolidatedPlace, DataQualityScore, GooglePlace, PlaceConcept, Provider,
    RatingSource, SourceRecord, SourceRef, SuggestionContext, WeatherReport, YelpBusiness,
};

/// Typed view of a group's members.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Members<'a> {
    pub google: Option<&'a GooglePlace>,
    pub yelp: Option<&'a YelpBusiness>,
    pub amadeus: Option<&'a AmadeusOffer>,
}

impl<'a> Members<'a> {
    pub fn of(group: &'a MatchGroup) -> Self {
        let mut members = Members::default();
        for record in &group.members {
            match record {
                SourceRecord::Google(place) => members.google = members.google.or(Some(place)),
                SourceRecord::Yelp(business) => members.yelp = members.yelp.or(Some(business)),
                SourceRecord::Amadeus(offer) => members.amadeus = members.amadeus.or(Some(offer)),
            }
        }
        members
    }

    /// Non-empty addresses in address priority order (google, amadeus, yelp).
    pub fn addresses(&self) -> Vec<String> {
        [
            self.google.and_then(|g| g.formatted_address.as_deref()),
            self.amadeus.and_then(|a| a.address.as_deref()),
            self.yelp.and_then(|y| y.address.as_deref()),
        ]
        .into_iter()
        .filter_map(non_blank)
        .collect()
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn first_of(candidates: &[Option<&str>]) -> Option<String> {
    candidates.iter().copied().find_map(non_blank)
}

/// Yelp `"$$"` style price to a 1..=4 level.
pub fn price_from_symbols(symbols: &str) -> Option<u8> {
    let count = symbols.trim().chars().filter(|c| *c == '$').count();
    (1..=4).contains(&count).then_some(count as u8)
}

/// Google `price_level`; 0 means "free or unknown" and is ignored.
pub fn price_from_level(level: u8) -> Option<u8> {
    (1..=4).contains(&level).then_some(level)
}

/// Review-count weighted mean rating, rounded to three decimals.
///
/// Only sources with a positive rating and at least one review take part.
/// When no rated source reports reviews, the first rated source in
/// `breakdown` is used as is and the review total is 0.
pub fn weighted_rating(breakdown: &[RatingSource]) -> Option<(f64, u64)> {
    let rated: Vec<&RatingSource> = breakdown.iter().filter(|r| r.rating > 0.0).collect();
    let usable: Vec<&RatingSource> = rated
        .iter()
        .copied()
        .filter(|r| r.review_count > 0)
        .collect();

    let total_reviews: u64 = usable.iter().map(|r| r.review_count).sum();
    if total_reviews == 0 {
        return rated
            .first()
            .map(|r| ((r.rating * 1000.0).round() / 1000.0, 0));
    }

    let weighted: f64 = usable
        .iter()
        .map(|r| r.rating * r.review_count as f64)
        .sum();
    let mean = weighted / total_reviews as f64;

    Some(((mean * 1000.0).round() / 1000.0, total_reviews))
}

/// Query parameters that sign or authorize a URL without changing what it
/// points at.
const SIGNING_PARAMS: &[&str] = &[
    "key",
    "api_key",
    "apikey",
    "appid",
    "sig",
    "signature",
    "token",
    "access_token",
];

/// Comparison key for photo URLs.
///
/// Host and path are lowercased with no scheme, fragment or trailing slash.
/// Query parameters stay (photo services identify the image there), except
/// signing ones, and are sorted so parameter order does not matter.
pub fn normalize_url(raw: &str) -> String {
    let Ok(parsed) = url::Url::parse(raw.trim()) else {
        let without_scheme = raw.split_once("://").map(|(_, rest)| rest).unwrap_or(raw);
        let without_fragment = without_scheme.split('#').next().unwrap_or(without_scheme);
        return without_fragment.trim().trim_end_matches('/').to_lowercase();
    };

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(name, _)| !SIGNING_PARAMS.contains(&name.to_ascii_lowercase().as_str()))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    params.sort();

    let mut key = format!(
        "{}{}",
        parsed.host_str().unwrap_or_default(),
        parsed.path().trim_end_matches('/')
    )
    .to_lowercase();
    if !params.is_empty() {
        let query = params
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        key.push('?');
        key.push_str(&query);
    }
    key
}

fn dedup_by_key<I, F>(values: I, key: F) -> Vec<String>
where
    I: IntoIterator<Item = String>,
    F: Fn(&str) -> String,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| !v.trim().is_empty())
        .filter(|v| seen.insert(key(v)))
        .collect()
}

fn hours_key(hours: &str) -> String {
    hours
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn subcategory(members: &Members<'_>) -> Option<String> {
    members
        .yelp
        .and_then(|y| y.categories.first())
        .and_then(|c| non_blank(Some(c.title.as_str())))
        .or_else(|| {
            members
                .google
                .and_then(|g| g.types.first())
                .map(|t| t.replace('_', " "))
        })
}

/// Rated sources in provider priority order. A missing review count is 0.
fn rating_breakdown(members: &Members<'_>) -> Vec<RatingSource> {
    let mut breakdown = Vec::new();
    if let Some(g) = members.google {
        if let Some(rating) = g.rating.filter(|r| *r > 0.0) {
            breakdown.push(RatingSource {
                provider: Provider::Google,
                rating,
                review_count: g.user_ratings_total.unwrap_or(0),
            });
        }
    }
    if let Some(y) = members.yelp {
        if let Some(rating) = y.rating.filter(|r| *r > 0.0) {
            breakdown.push(RatingSource {
                provider: Provider::Yelp,
                rating,
                review_count: y.review_count.unwrap_or(0),
            });
        }
    }
    breakdown
}

fn source_ref(record: &SourceRecord) -> SourceRef {
    let url = match record {
        SourceRecord::Google(g) => g.maps_url.clone(),
        SourceRecord::Yelp(y) => y.url.clone(),
        SourceRecord::Amadeus(a) => a.booking_link.clone(),
    };
    SourceRef {
        provider: record.provider(),
        provider_id: record.id().to_string(),
        url,
    }
}

/// Merge a group without any LLM assistance.
pub fn merge_group(
    concept: &PlaceConcept,
    group: &MatchGroup,
    weather: Option<&WeatherReport>,
) -> Result<ConsolidatedPlace, ConsolidationError> {
    if group.is_empty() {
        return Err(ConsolidationError::EmptyGroup);
    }

    let members = Members::of(group);
    let (google, yelp, amadeus) = (members.google, members.yelp, members.amadeus);

    let canonical_name = first_of(&[
        google.map(|g| g.name.as_str()),
        yelp.map(|y| y.name.as_str()),
        amadeus.map(|a| a.name.as_str()),
    ])
    .ok_or(ConsolidationError::MissingName)?;

    let price_level = yelp
        .and_then(|y| y.price.as_deref())
        .and_then(price_from_symbols)
        .or_else(|| google.and_then(|g| g.price_level).and_then(price_from_level));

    let breakdown = rating_breakdown(&members);
    let rating = weighted_rating(&breakdown);

    let photos = dedup_by_key(
        google
            .map(|g| g.photos.clone())
            .unwrap_or_default()
            .into_iter()
            .chain(yelp.and_then(|y| y.image_url.clone()))
            .chain(yelp.map(|y| y.photos.clone()).unwrap_or_default())
            .chain(amadeus.map(|a| a.pictures.clone()).unwrap_or_default()),
        normalize_url,
    );

    let hours = dedup_by_key(
        google.map(|g| g.opening_hours.clone()).unwrap_or_default(),
        hours_key,
    );

    let phones = dedup_by_key(
        [
            google.and_then(|g| g.phone.clone()),
            yelp.and_then(|y| y.phone.clone()),
        ]
        .into_iter()
        .flatten()
        .map(|p| p.trim().to_string()),
        |p| phone_key(p).unwrap_or_else(|| p.to_string()),
    );

    let mut place = ConsolidatedPlace {
        id: Uuid::new_v4(),
        canonical_name,
        category: concept.category,
        subcategory: subcategory(&members),
        coordinates: google
            .and_then(|g| g.coordinates)
            .or_else(|| yelp.and_then(|y| y.coordinates))
            .or_else(|| amadeus.and_then(|a| a.coordinates)),
        formatted_address: members.addresses().into_iter().next(),
        city: yelp.and_then(|y| non_blank(y.city.as_deref())),
        country: yelp.and_then(|y| non_blank(y.country.as_deref())),
        aggregated_rating: rating.map(|(r, _)| r),
        total_review_count: rating.map(|(_, count)| count).filter(|count| *count > 0),
        rating_breakdown: breakdown,
        price_level,
        price_display: price_level.map(|level| "$".repeat(level as usize)),
        booking_price: amadeus.and_then(|a| a.price.clone()),
        description: first_of(&[
            google.and_then(|g| g.editorial_summary.as_deref()),
            amadeus.and_then(|a| a.description.as_deref()),
        ]),
        primary_photo: photos.first().cloned(),
        photos,
        hours,
        phones,
        website: first_of(&[
            google.and_then(|g| g.website.as_deref()),
            yelp.and_then(|y| y.url.as_deref()),
        ]),
        is_open_now: google.and_then(|g| g.open_now),
        booking_url: amadeus.and_then(|a| non_blank(a.booking_link.as_deref())),
        sources: group.members.iter().map(source_ref).collect(),
        weather: weather.cloned(),
        match_confidence: group.confidence,
        data_quality: DataQualityScore::default(),
        suggestion_context: concept.context.as_ref().map(SuggestionContext::from),
        last_updated: Utc::now(),
    };

    place.data_quality = quality::assess(&place, group);
    Ok(place)
}
