use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CaseField, HeadacheCase, ProvenanceSource, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueState {
    AwaitingFirstMessage,
    Collecting,
    Complete,
}

/// Why the dialogue stopped asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    CriticalFieldsResolved,
    NothingLeftToAsk,
    QuestionBudgetExhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// One conversation: the case under construction and what was asked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub case: HeadacheCase,
    /// Fields already asked, in order. Never asked twice.
    pub asked_fields: Vec<CaseField>,
    pub last_asked: Option<CaseField>,
    pub history: Vec<Utterance>,
    pub state: DialogueState,
    pub completion: Option<CompletionReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            case: HeadacheCase::new(),
            asked_fields: Vec::new(),
            last_asked: None,
            history: Vec::new(),
            state: DialogueState::AwaitingFirstMessage,
            completion: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Start from a case supplied by the caller. Known fields without
    /// provenance are treated as stated by the caller.
    pub fn from_snapshot(mut case: HeadacheCase) -> Self {
        case.repair_provenance(ProvenanceSource::Answer);
        Self {
            case,
            ..Self::new()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == DialogueState::Complete
    }

    pub fn questions_asked(&self) -> usize {
        self.asked_fields.len()
    }

    pub fn was_asked(&self, field: CaseField) -> bool {
        self.asked_fields.contains(&field)
    }

    /// Record `field` as asked. Returns false if it already was.
    pub fn mark_asked(&mut self, field: CaseField) -> bool {
        if self.was_asked(field) {
            return false;
        }
        self.asked_fields.push(field);
        self.last_asked = Some(field);
        true
    }

    pub fn record(&mut self, role: Role, text: impl Into<String>) {
        let now = Utc::now();
        self.history.push(Utterance {
            role,
            text: text.into(),
            at: now,
        });
        self.updated_at = now;
    }

    /// Back to an empty conversation, keeping the id.
    pub fn reset(&mut self) {
        *self = Self::with_id(self.id);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CaseField;

    #[test]
    fn new_session_awaits_first_message() {
        let session = Session::new();
        assert_eq!(session.state, DialogueState::AwaitingFirstMessage);
        assert!(session.asked_fields.is_empty());
        assert!(session.case.known_values().is_empty());
    }

    #[test]
    fn fields_are_marked_once() {
        let mut session = Session::new();
        assert!(session.mark_asked(CaseField::Fever));
        assert!(!session.mark_asked(CaseField::Fever));
        assert_eq!(session.questions_asked(), 1);
        assert_eq!(session.last_asked, Some(CaseField::Fever));
    }

    #[test]
    fn reset_keeps_id_only() {
        let mut session = Session::new();
        let id = session.id;
        session.mark_asked(CaseField::Onset);
        session.record(Role::User, "headache");
        session.state = DialogueState::Collecting;
        session.reset();
        assert_eq!(session.id, id);
        assert!(session.history.is_empty());
        assert!(session.asked_fields.is_empty());
        assert_eq!(session.state, DialogueState::AwaitingFirstMessage);
    }

    #[test]
    fn snapshot_gets_provenance() {
        let case = HeadacheCase {
            fever: Some(true),
            ..Default::default()
        };
        let session = Session::from_snapshot(case);
        assert!(session.case.provenance_consistent());
        assert_eq!(
            session.case.provenance_of(CaseField::Fever).map(|p| p.source),
            Some(ProvenanceSource::Answer)
        );
    }
}
