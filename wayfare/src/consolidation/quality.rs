use crate::matching::MatchGroup;
use crate::models::{ConsolidatedPlace, DataQualityScore};

/// Corroboration credited to an uncorroborated single source.
const SINGLE_SOURCE_CORROBORATION: f64 = 0.4;
const COMPLETENESS_WEIGHT: f64 = 0.6;
const CORROBORATION_WEIGHT: f64 = 0.4;

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Share of the traveller-facing fields that are populated.
pub fn completeness(place: &ConsolidatedPlace) -> f64 {
    let checks = [
        !place.canonical_name.trim().is_empty(),
        place.coordinates.is_some(),
        place.formatted_address.is_some(),
        place.aggregated_rating.is_some(),
        place.price_level.is_some() || place.booking_price.is_some(),
        place.description.is_some(),
        !place.photos.is_empty(),
        !place.hours.is_empty(),
        !place.phones.is_empty(),
        place.website.is_some() || place.booking_url.is_some(),
    ];
    let filled = checks.iter().filter(|present| **present).count();
    filled as f64 / checks.len() as f64
}

/// Probability-style union of the evidence each joining member brought.
/// Every extra member can only raise it.
fn corroboration(join_scores: &[f64]) -> f64 {
    let doubt = join_scores
        .iter()
        .fold(1.0 - SINGLE_SOURCE_CORROBORATION, |doubt, score| {
            doubt * (1.0 - score.clamp(0.0, 1.0))
        });
    1.0 - doubt
}

pub fn assess(place: &ConsolidatedPlace, group: &MatchGroup) -> DataQualityScore {
    let completeness = completeness(place);
    let corroboration = corroboration(&group.join_scores);

    DataQualityScore {
        overall: round3(COMPLETENESS_WEIGHT * completeness + CORROBORATION_WEIGHT * corroboration),
        completeness: round3(completeness),
        source_agreement: round3(group.confidence),
        source_count: group.len(),
    }
}
