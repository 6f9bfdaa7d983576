mod concept_cache;

pub use concept_cache::{fingerprint, ConceptCache};
