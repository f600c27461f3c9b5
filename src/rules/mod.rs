pub mod adaptation;
pub mod engine;
pub mod loader;
pub mod types;

pub use adaptation::*;
pub use engine::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleConfigError {
    #[error("Cannot read rule file: {0}")]
    Io(String),

    #[error("Malformed rule file: {0}")]
    Parse(String),

    #[error("Rule {rule} is invalid: {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("Duplicate rule id: {0}")]
    DuplicateRule(String),

    #[error("Rule {rule} references unknown field {field}")]
    UnknownField { rule: String, field: String },

    #[error("Rule {rule}: condition on {field} must be {expected}")]
    TypeMismatch {
        rule: String,
        field: String,
        expected: String,
    },

    #[error("{owner} references unknown imaging {imaging}")]
    UnknownImaging { owner: String, imaging: String },

    #[error("Invalid imaging catalog: {0}")]
    InvalidCatalog(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecisionError {
    #[error("No rule matched and no fallback is configured for profile {profile}")]
    NoMatchingRule { profile: String },
}
