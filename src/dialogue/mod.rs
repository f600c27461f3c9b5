//! Dialogue engine: session state, missing-field tiers, question selection,
//! short-answer interpretation and completion.

pub mod answers;
pub mod engine;
pub mod priority;
pub mod questions;
pub mod registry;
pub mod session;

#[cfg(test)]
mod scenario_tests;

pub use answers::{interpret_answer, interpret_yes_no, Interpretation, YesNo};
pub use engine::{DialogueEngine, TurnOutcome, DEFAULT_QUESTION_BUDGET};
pub use priority::{missing_fields, next_field, TIERS};
pub use questions::{question_for, AnswerKind, Question};
pub use registry::SessionRegistry;
pub use session::{CompletionReason, DialogueState, Session, Utterance};

use thiserror::Error;
use uuid::Uuid;

use crate::models::CaseError;
use crate::rules::DecisionError;

#[derive(Error, Debug)]
pub enum DialogueError {
    #[error("Unknown session: {0}")]
    UnknownSession(Uuid),

    #[error("Answer could not be recorded: {0}")]
    InvalidAnswer(#[from] CaseError),

    #[error(transparent)]
    Decision(#[from] DecisionError),
}
