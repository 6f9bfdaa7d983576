mod suggestions;

pub use suggestions::{
    BatchResult, BatchSummary, GenerateRequest, SuggestionOptions, SuggestionService,
    MAX_GENERATED_CONCEPTS,
};
