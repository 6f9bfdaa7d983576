mod merge;
mod quality;
mod service;

use thiserror::Error;

use crate::error::WayfareError;

pub use merge::{merge_group, normalize_url, price_from_level, price_from_symbols, weighted_rating};
pub use quality::{assess, completeness};
pub use service::ConsolidationService;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsolidationError {
    /// Nothing to merge; reported to callers as an unresolved concept.
    #[error("match group has no members")]
    EmptyGroup,

    #[error("no source supplied a usable name")]
    MissingName,
}

impl From<ConsolidationError> for WayfareError {
    fn from(error: ConsolidationError) -> Self {
        WayfareError::Consolidation(error.to_string())
    }
}
