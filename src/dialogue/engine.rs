use serde::Serialize;
use uuid::Uuid;

use crate::models::{CaseField, FieldProvenance, HeadacheCase, ProvenanceSource, Recommendation, Role};
use crate::pipeline::nlu::{apply_inferences, ExtractionMetadata, NluOrchestrator};
use crate::rules::RuleEngine;

use super::answers::{interpret_answer, is_bare_answer, Interpretation, DEFAULT_SHORT_ANSWER_TOKENS};
use super::priority::{askable_fields, critical_fields_resolved};
use super::questions::{question_for, Question};
use super::session::{CompletionReason, DialogueState, Session};
use super::DialogueError;

/// Maximum number of questions in one conversation.
pub const DEFAULT_QUESTION_BUDGET: usize = 12;

/// Result of one conversational turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub session_id: Uuid,
    pub updated_case: HeadacheCase,
    pub next_question: Option<Question>,
    pub dialogue_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<CompletionReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
    pub metadata: ExtractionMetadata,
}

/// Drives a session from free text to a recommendation.
#[derive(Clone)]
pub struct DialogueEngine {
    nlu: NluOrchestrator,
    rules: RuleEngine,
    question_budget: usize,
    short_answer_tokens: usize,
}

impl DialogueEngine {
    pub fn new(nlu: NluOrchestrator, rules: RuleEngine) -> Self {
        Self {
            nlu,
            rules,
            question_budget: DEFAULT_QUESTION_BUDGET,
            short_answer_tokens: DEFAULT_SHORT_ANSWER_TOKENS,
        }
    }

    pub fn with_question_budget(mut self, budget: usize) -> Self {
        self.question_budget = budget;
        self
    }

    pub fn with_short_answer_tokens(mut self, tokens: usize) -> Self {
        self.short_answer_tokens = tokens;
        self
    }

    pub fn nlu(&self) -> &NluOrchestrator {
        &self.nlu
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    /// Process one user message.
    ///
    /// A bare reply to the last question ("no", "7") answers that field
    /// directly; any other reply also goes through extraction. Once
    /// complete, later messages are still extracted and the recommendation
    /// is recomputed.
    ///
    /// The turn is all or nothing: on error the session is left exactly as
    /// it was before the message.
    pub fn process_message(&self, session: &mut Session, message: &str) -> Result<TurnOutcome, DialogueError> {
        let mut draft = session.clone();
        let outcome = self.run_turn(&mut draft, message).inspect_err(|e| {
            tracing::warn!(session_id = %session.id, error = %e, "Turn failed, session unchanged");
        })?;
        *session = draft;
        Ok(outcome)
    }

    fn run_turn(&self, session: &mut Session, message: &str) -> Result<TurnOutcome, DialogueError> {
        session.record(Role::User, message);
        if session.state == DialogueState::AwaitingFirstMessage {
            session.state = DialogueState::Collecting;
            tracing::info!(session_id = %session.id, "Dialogue started");
        }

        let answering = session.last_asked.take();
        let metadata = match answering {
            Some(field) => self.absorb_answer(&mut session.case, field, message)?,
            None => self.nlu.extract_into(message, &mut session.case, None),
        };

        let next_question = if session.is_complete() {
            None
        } else {
            self.advance(session)
        };

        let recommendation = if session.is_complete() {
            Some(self.rules.decide(&session.case)?)
        } else {
            None
        };

        if let Some(question) = &next_question {
            session.record(Role::Assistant, question.text.clone());
        }

        tracing::info!(
            session_id = %session.id,
            state = ?session.state,
            questions_asked = session.questions_asked(),
            updated = metadata.updated_fields.len(),
            next = ?next_question.as_ref().map(|q| q.field),
            "Turn processed"
        );

        Ok(TurnOutcome {
            session_id: session.id,
            updated_case: session.case.clone(),
            next_question,
            dialogue_complete: session.is_complete(),
            completion: session.completion,
            recommendation,
            metadata,
        })
    }

    fn absorb_answer(
        &self,
        case: &mut HeadacheCase,
        field: CaseField,
        reply: &str,
    ) -> Result<ExtractionMetadata, DialogueError> {
        let interpretation = interpret_answer(field, reply, self.short_answer_tokens);
        let direct = !matches!(interpretation, Interpretation::Unrecognized);

        if direct && is_bare_answer(reply, self.short_answer_tokens) {
            let recorded = match interpretation {
                Interpretation::Value(value) => {
                    let provenance = FieldProvenance::new(ProvenanceSource::Answer, 1.0).with_text(reply.trim());
                    case.set(field, value, provenance)?;
                    apply_inferences(case);
                    true
                }
                _ => false,
            };
            tracing::debug!(field = %field, recorded, "Bare answer interpreted");
            return Ok(ExtractionMetadata::direct_answer(field, recorded));
        }

        let mut metadata = self.nlu.extract_into(reply, case, Some(field));
        if let Interpretation::Value(value) = interpretation {
            // Extraction found nothing for the asked field; the leading
            // yes/no answers it.
            if !metadata.updated_fields.contains(&field) && !metadata.kept_fields.contains(&field) {
                let provenance = FieldProvenance::new(ProvenanceSource::Answer, 1.0).with_text(reply.trim());
                case.set(field, value, provenance)?;
                apply_inferences(case);
                metadata.updated_fields.push(field);
            }
        }
        Ok(metadata)
    }

    /// Pick the next question or complete the dialogue.
    fn advance(&self, session: &mut Session) -> Option<Question> {
        let reason = if critical_fields_resolved(&session.case) {
            Some(CompletionReason::CriticalFieldsResolved)
        } else if session.questions_asked() >= self.question_budget {
            Some(CompletionReason::QuestionBudgetExhausted)
        } else {
            None
        };

        if reason.is_none() {
            let next = askable_fields(&session.case, &session.asked_fields)
                .into_iter()
                .find_map(|field| question_for(field, &session.case));
            if let Some(question) = next {
                session.mark_asked(question.field);
                return Some(question);
            }
        }

        let reason = reason.unwrap_or(CompletionReason::NothingLeftToAsk);
        session.state = DialogueState::Complete;
        session.completion = Some(reason);
        tracing::info!(
            session_id = %session.id,
            reason = ?reason,
            questions_asked = session.questions_asked(),
            emergency = session.case.is_emergency(),
            red_flags = session.case.red_flags().len(),
            "Dialogue complete"
        );
        None
    }
}
