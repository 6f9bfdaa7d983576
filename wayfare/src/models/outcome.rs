use serde::{Deserialize, Serialize};

use super::ConsolidatedPlace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// Providers answered but nothing matched.
    NoData,
    /// Every routed place provider errored or timed out.
    AllProvidersFailed,
    /// No credentialed provider is routed for the category.
    NoProvidersConfigured,
}

/// Result for one concept, in the same position as the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConceptOutcome {
    Resolved {
        place: Box<ConsolidatedPlace>,
        cache_hit: bool,
    },
    Unresolved {
        concept_name: String,
        reason: UnresolvedReason,
        errors: Vec<String>,
    },
}

impl ConceptOutcome {
    pub fn resolved(place: ConsolidatedPlace) -> Self {
        ConceptOutcome::Resolved {
            place: Box::new(place),
            cache_hit: false,
        }
    }

    pub fn unresolved(
        concept_name: impl Into<String>,
        reason: UnresolvedReason,
        errors: Vec<String>,
    ) -> Self {
        ConceptOutcome::Unresolved {
            concept_name: concept_name.into(),
            reason,
            errors,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ConceptOutcome::Resolved { .. })
    }

    pub fn is_cache_hit(&self) -> bool {
        matches!(self, ConceptOutcome::Resolved { cache_hit: true, .. })
    }

    pub fn place(&self) -> Option<&ConsolidatedPlace> {
        match self {
            ConceptOutcome::Resolved { place, .. } => Some(place),
            ConceptOutcome::Unresolved { .. } => None,
        }
    }
}
