mod geo;
mod matcher;
pub mod normalize;

pub use geo::{haversine_m, proximity_score};
pub use matcher::{EntityMatcher, MatchGroup, MatchSignal, PairScore};
