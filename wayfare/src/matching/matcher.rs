use serde::Serialize;

use super::geo::{haversine_m, proximity_score};
use super::normalize::{address_similarity, name_similarity, phones_match};
use crate::config::MatchingConfig;
use crate::models::{PlaceCategory, PlaceConcept, Provider, RawApiResults, SourceRecord};

const ADDRESS_MATCH_THRESHOLD: f64 = 0.8;
const AUXILIARY_BONUS: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSignal {
    Name,
    Coordinates,
    Category,
    Address,
    Phone,
}

/// Evidence that two records denote the same place.
#[derive(Debug, Clone, PartialEq)]
pub struct PairScore {
    pub name: f64,
    /// `None` when either side lacks coordinates.
    pub proximity: Option<f64>,
    pub category: f64,
    pub score: f64,
    pub vetoed: bool,
    pub signals: Vec<MatchSignal>,
}

/// Records judged to be the same physical place, at most one per provider.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchGroup {
    pub members: Vec<SourceRecord>,
    pub confidence: f64,
    pub matched_by: Vec<MatchSignal>,
    /// Score each non-founding member joined with, in join order.
    pub join_scores: Vec<f64>,
    pair_scores: Vec<f64>,
}

impl MatchGroup {
    fn singleton(record: SourceRecord) -> Self {
        Self {
            members: vec![record],
            confidence: 1.0,
            matched_by: Vec::new(),
            join_scores: Vec::new(),
            pair_scores: Vec::new(),
        }
    }

    pub fn from_members(members: Vec<SourceRecord>, matcher: &EntityMatcher) -> Self {
        let mut iter = members.into_iter();
        let Some(first) = iter.next() else {
            return Self {
                members: Vec::new(),
                confidence: 0.0,
                matched_by: Vec::new(),
                join_scores: Vec::new(),
                pair_scores: Vec::new(),
            };
        };
        let mut group = Self::singleton(first);
        for record in iter {
            let best = group
                .members
                .iter()
                .map(|m| matcher.score_pair(m, &record))
                .max_by(|a, b| a.score.total_cmp(&b.score));
            if let Some(best) = best {
                group.admit(record, &best, matcher);
            }
        }
        group
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn providers(&self) -> Vec<Provider> {
        self.members.iter().map(SourceRecord::provider).collect()
    }

    pub fn has_provider(&self, provider: Provider) -> bool {
        self.members.iter().any(|m| m.provider() == provider)
    }

    pub fn member(&self, provider: Provider) -> Option<&SourceRecord> {
        self.members.iter().find(|m| m.provider() == provider)
    }

    fn admit(&mut self, record: SourceRecord, joined_on: &PairScore, matcher: &EntityMatcher) {
        for existing in &self.members {
            self.pair_scores.push(matcher.score_pair(existing, &record).score);
        }
        for signal in &joined_on.signals {
            if !self.matched_by.contains(signal) {
                self.matched_by.push(*signal);
            }
        }
        self.matched_by.sort();
        self.join_scores.push(joined_on.score);
        self.members.push(record);
        self.confidence =
            self.pair_scores.iter().sum::<f64>() / self.pair_scores.len().max(1) as f64;
    }
}

#[derive(Debug, Clone)]
pub struct EntityMatcher {
    config: MatchingConfig,
}

impl Default for EntityMatcher {
    fn default() -> Self {
        Self::new(MatchingConfig::default())
    }
}

impl EntityMatcher {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    pub fn score_pair(&self, a: &SourceRecord, b: &SourceRecord) -> PairScore {
        let name = name_similarity(a.name(), b.name());

        let (proximity, vetoed) = match (a.coordinates(), b.coordinates()) {
            (Some(left), Some(right)) => {
                let distance = haversine_m(left, right);
                match proximity_score(
                    distance,
                    self.config.strong_radius_m,
                    self.config.weak_radius_m,
                ) {
                    Some(score) => (Some(score), false),
                    None => (Some(0.0), true),
                }
            }
            _ => (None, false),
        };

        let category = category_compatibility(a.category(), b.category());

        let composite = match proximity {
            Some(geo) => 0.5 * name + 0.35 * geo + 0.15 * category,
            None => 0.8 * name + 0.2 * category,
        };

        let mut signals = Vec::new();
        if name >= self.config.name_cutoff {
            signals.push(MatchSignal::Name);
        }
        if proximity.is_some_and(|geo| !vetoed && geo >= 0.5) {
            signals.push(MatchSignal::Coordinates);
        }
        if category >= 0.7 {
            signals.push(MatchSignal::Category);
        }

        let mut bonus = 0.0;
        if let (Some(left), Some(right)) = (a.address(), b.address()) {
            if address_similarity(left, right) >= ADDRESS_MATCH_THRESHOLD {
                signals.push(MatchSignal::Address);
                bonus += AUXILIARY_BONUS;
            }
        }
        if let (Some(left), Some(right)) = (a.phone(), b.phone()) {
            if phones_match(left, right) {
                signals.push(MatchSignal::Phone);
                bonus += AUXILIARY_BONUS;
            }
        }

        PairScore {
            name,
            proximity,
            category,
            score: (composite + bonus).min(1.0),
            vetoed,
            signals,
        }
    }

    pub fn is_match(&self, pair: &PairScore) -> bool {
        !pair.vetoed
            && pair.name >= self.config.name_cutoff
            && pair.score >= self.config.match_threshold
    }

    /// Group one concept's provider results.
    pub fn group(&self, raw: &RawApiResults) -> Vec<MatchGroup> {
        self.group_records(raw.records())
    }

    /// Greedy grouping in provider priority order.
    ///
    /// A candidate joins the group holding its best-scoring matching member,
    /// as long as that group has no member from the same provider and no
    /// member it is geographically vetoed against.
    pub fn group_records(&self, mut records: Vec<SourceRecord>) -> Vec<MatchGroup> {
        records.sort_by_key(|r| r.provider().priority());
        let mut groups: Vec<MatchGroup> = Vec::new();

        for record in records {
            let mut best: Option<(usize, PairScore)> = None;

            for (index, group) in groups.iter().enumerate() {
                if group.has_provider(record.provider()) {
                    continue;
                }
                let pairs: Vec<PairScore> = group
                    .members
                    .iter()
                    .map(|m| self.score_pair(m, &record))
                    .collect();
                if pairs.iter().any(|p| p.vetoed) {
                    continue;
                }
                let Some(pair) = pairs
                    .into_iter()
                    .filter(|p| self.is_match(p))
                    .max_by(|a, b| a.score.total_cmp(&b.score))
                else {
                    continue;
                };
                if best
                    .as_ref()
                    .map_or(true, |(_, current)| pair.score > current.score)
                {
                    best = Some((index, pair));
                }
            }

            match best {
                Some((index, pair)) => groups[index].admit(record, &pair, self),
                None => groups.push(MatchGroup::singleton(record)),
            }
        }

        tracing::debug!(groups = groups.len(), "Grouped provider results");
        groups
    }

    /// The group that best answers the concept: highest name similarity to
    /// the concept, then more members, then provider priority.
    pub fn select_primary(
        &self,
        concept: &PlaceConcept,
        groups: Vec<MatchGroup>,
    ) -> Option<MatchGroup> {
        groups
            .into_iter()
            .filter(|g| !g.is_empty())
            .map(|g| {
                let similarity = g
                    .members
                    .iter()
                    .map(|m| name_similarity(&concept.name, m.name()))
                    .fold(0.0_f64, f64::max);
                (similarity, g)
            })
            .max_by(|(sim_a, a), (sim_b, b)| {
                sim_a
                    .total_cmp(sim_b)
                    .then(a.len().cmp(&b.len()))
                    .then(lead_priority(b).cmp(&lead_priority(a)))
            })
            .map(|(_, g)| g)
    }
}

fn lead_priority(group: &MatchGroup) -> u8 {
    group
        .members
        .iter()
        .map(|m| m.provider().priority())
        .min()
        .unwrap_or(u8::MAX)
}

fn category_compatibility(a: Option<PlaceCategory>, b: Option<PlaceCategory>) -> f64 {
    match (a, b) {
        (Some(left), Some(right)) if left == right => 1.0,
        (Some(left), Some(right)) if left.family() == right.family() => 0.7,
        (Some(_), Some(_)) => 0.0,
        _ => 0.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AmadeusKind, AmadeusOffer, Coordinates, GooglePlace, YelpBusiness, YelpCategory,
    };

    fn google(name: &str, lat: f64, lng: f64) -> SourceRecord {
        SourceRecord::Google(GooglePlace {
            place_id: format!("g-{name}"),
            name: name.to_string(),
            coordinates: Some(Coordinates::new(lat, lng)),
            types: vec!["restaurant".into()],
            ..Default::default()
        })
    }

    fn yelp(name: &str, lat: f64, lng: f64) -> SourceRecord {
        SourceRecord::Yelp(YelpBusiness {
            id: format!("y-{name}"),
            name: name.to_string(),
            coordinates: Some(Coordinates::new(lat, lng)),
            categories: vec![YelpCategory {
                alias: "restaurants".into(),
                title: "Restaurants".into(),
            }],
            ..Default::default()
        })
    }

    fn hotel(name: &str, lat: f64, lng: f64) -> SourceRecord {
        SourceRecord::Amadeus(AmadeusOffer {
            id: format!("a-{name}"),
            kind: AmadeusKind::Hotel,
            name: name.to_string(),
            coordinates: Some(Coordinates::new(lat, lng)),
            address: None,
            description: None,
            price: None,
            booking_link: None,
            pictures: Vec::new(),
            stars: None,
        })
    }

    #[test]
    fn close_fuzzy_names_group_together() {
        // ~24 m apart.
        let matcher = EntityMatcher::default();
        let groups = matcher.group_records(vec![
            yelp("Joes Pizza", 40.76168, -73.98164),
            google("Joe's Pizza Restaurant", 40.7615, -73.9818),
        ]);

        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.providers(), vec![Provider::Google, Provider::Yelp]);
        assert!(group.matched_by.contains(&MatchSignal::Name));
        assert!(group.matched_by.contains(&MatchSignal::Coordinates));
        assert!(group.confidence > 0.9);
    }

    #[test]
    fn identical_names_five_km_apart_never_match() {
        let matcher = EntityMatcher::default();
        let a = google("Shake Shack", 40.7415, -73.9882);
        let b = yelp("Shake Shack", 40.7865, -73.9882);

        let pair = matcher.score_pair(&a, &b);
        assert!(pair.vetoed);
        assert!(!matcher.is_match(&pair));
        assert_eq!(matcher.group_records(vec![a, b]).len(), 2);
    }

    #[test]
    fn same_provider_never_shares_a_group() {
        let matcher = EntityMatcher::default();
        let groups = matcher.group_records(vec![
            google("Blue Bottle Coffee", 40.0, -73.0),
            google("Blue Bottle Coffee", 40.0, -73.0),
        ]);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn names_alone_can_match_without_coordinates() {
        let matcher = EntityMatcher::default();
        let mut a = google("Ritz Paris", 0.0, 0.0);
        if let SourceRecord::Google(place) = &mut a {
            place.coordinates = None;
            place.types = vec!["lodging".into()];
        }
        let b = hotel("Hotel Ritz Paris", 48.868, 2.329);

        let pair = matcher.score_pair(&a, &b);
        assert_eq!(pair.proximity, None);
        assert!(matcher.is_match(&pair), "pair was {pair:?}");
    }

    #[test]
    fn shared_phone_adds_a_signal() {
        let matcher = EntityMatcher::default();
        let mut a = google("Le Bernardin", 40.7615, -73.9818);
        let mut b = yelp("Le Bernardin", 40.7616, -73.9817);
        if let SourceRecord::Google(place) = &mut a {
            place.phone = Some("+1 212-554-1515".into());
        }
        if let SourceRecord::Yelp(business) = &mut b {
            business.phone = Some("(212) 554-1515".into());
        }

        let pair = matcher.score_pair(&a, &b);
        assert!(pair.signals.contains(&MatchSignal::Phone));
        assert_eq!(pair.score, 1.0);
    }

    #[test]
    fn primary_group_prefers_concept_name() {
        let matcher = EntityMatcher::default();
        let groups = matcher.group_records(vec![
            google("Pizza Hut", 40.0, -73.0),
            yelp("Joe's Pizza", 41.0, -73.0),
        ]);
        assert_eq!(groups.len(), 2);

        let concept = PlaceConcept::new("Joe's Pizza", PlaceCategory::Restaurant);
        let primary = matcher.select_primary(&concept, groups).expect("primary");
        assert_eq!(primary.providers(), vec![Provider::Yelp]);
    }

    #[test]
    fn empty_results_produce_no_groups() {
        let matcher = EntityMatcher::default();
        assert!(matcher.group(&RawApiResults::default()).is_empty());
    }
}
