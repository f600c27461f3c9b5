//! Concept vocabulary: configuration-driven clinical concepts with ordered
//! pattern variants, negation scope and anti-pattern suppression.

pub mod fuzzy;
pub mod loader;
pub mod matcher;
pub mod negation;
pub mod normalize;
pub mod types;

pub use matcher::Vocabulary;
pub use normalize::{normalize, NormalizedText};
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VocabularyError {
    #[error("Cannot read vocabulary: {0}")]
    Io(String),

    #[error("Vocabulary is not valid JSON: {0}")]
    Parse(String),

    #[error("Invalid vocabulary settings: {0}")]
    InvalidSettings(String),

    #[error("Invalid concept {concept}: {reason}")]
    InvalidConcept { concept: String, reason: String },

    #[error("Duplicate concept id: {0}")]
    DuplicateConcept(String),
}
