//! Case builder: runs the extractors over a message, merges the evidence
//! into the case and consults the semantic fallback when confidence is low.

pub mod corpus;
pub mod fallback;
pub mod merge;
pub mod orchestrator;

pub use corpus::{AnnotatedExample, ExampleCorpus};
pub use fallback::{
    BoundedFallback, ExampleMatch, LexicalSimilarity, MockFallback, SimilarityFallback, DEFAULT_FALLBACK_TIMEOUT,
    DEFAULT_MIN_SIMILARITY,
};
pub use merge::{apply_inferences, merge_all, merge_evidence, MergeOutcome, MergeReport};
pub use orchestrator::{ExtractionMetadata, FallbackStatus, NluOrchestrator};

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FallbackError {
    #[error("Similarity engine unavailable: {0}")]
    Unavailable(String),

    #[error("Similarity lookup timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Cannot read example corpus: {0}")]
    Io(String),

    #[error("Example corpus is not valid JSON: {0}")]
    Parse(String),

    #[error("Invalid example {example}: {reason}")]
    InvalidExample { example: String, reason: String },

    #[error("Duplicate example id: {0}")]
    DuplicateExample(String),
}
