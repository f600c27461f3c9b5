//! Transport-agnostic triage service.
//!
//! `TriageService` owns the shared, immutable engines and the live session
//! registry. Any front end (HTTP handler, CLI, test harness) drives the
//! conversation through `process_turn`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{ConfigError, EngineConfig};
use crate::dialogue::{DialogueEngine, DialogueError, Question, SessionRegistry, TurnOutcome};
use crate::models::{HeadacheCase, Recommendation};
use crate::pipeline::nlu::{BoundedFallback, CorpusError, ExampleCorpus, ExtractionMetadata, LexicalSimilarity, NluOrchestrator};
use crate::pipeline::vocabulary::{Vocabulary, VocabularyError};
use crate::rules::{RuleConfigError, RuleEngine, RuleSet};

#[derive(Error, Debug)]
pub enum TriageError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Vocabulary(#[from] VocabularyError),

    #[error(transparent)]
    Rules(#[from] RuleConfigError),

    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error(transparent)]
    Dialogue(#[from] DialogueError),

    #[error("Turn processing failed: {0}")]
    Task(String),
}

// ═══════════════════════════════════════════════════════════
// Turn envelopes
// ═══════════════════════════════════════════════════════════

/// One inbound message. Without a session id a new session is opened,
/// optionally seeded from a case snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundTurn {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub session_snapshot: Option<HeadacheCase>,
}

impl InboundTurn {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn in_session(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_snapshot(mut self, case: HeadacheCase) -> Self {
        self.session_snapshot = Some(case);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundTurn {
    pub session_id: Uuid,
    pub updated_case: HeadacheCase,
    pub next_question: Option<Question>,
    pub dialogue_complete: bool,
    pub recommendation: Option<Recommendation>,
    pub metadata: ExtractionMetadata,
}

impl From<TurnOutcome> for OutboundTurn {
    fn from(outcome: TurnOutcome) -> Self {
        Self {
            session_id: outcome.session_id,
            updated_case: outcome.updated_case,
            next_question: outcome.next_question,
            dialogue_complete: outcome.dialogue_complete,
            recommendation: outcome.recommendation,
            metadata: outcome.metadata,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// TriageService
// ═══════════════════════════════════════════════════════════

pub struct TriageService {
    engine: Arc<DialogueEngine>,
    registry: SessionRegistry,
}

impl TriageService {
    pub fn new(engine: DialogueEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            registry: SessionRegistry::new(),
        }
    }

    /// Built-in resources with default settings.
    pub fn builtin() -> Result<Self, TriageError> {
        Self::from_config(&EngineConfig::default())
    }

    /// Load resources and wire the engines as configured. Fails fast on any
    /// invalid resource.
    pub fn from_config(config: &EngineConfig) -> Result<Self, TriageError> {
        config.validate()?;

        let mut vocabulary = match &config.vocabulary_path {
            Some(path) => Vocabulary::load(path)?,
            None => Vocabulary::builtin()?,
        };
        if let Some(floor) = config.fuzzy_floor {
            vocabulary = vocabulary.with_similarity_floor(floor);
        }

        let mut nlu = NluOrchestrator::new(Arc::new(vocabulary)).with_threshold(config.fallback_threshold);
        if config.fallback_enabled {
            let corpus = match &config.corpus_path {
                Some(path) => ExampleCorpus::load(path)?,
                None => ExampleCorpus::builtin()?,
            };
            let similarity =
                LexicalSimilarity::new(Arc::new(corpus)).with_min_similarity(config.fallback_min_similarity);
            nlu = nlu.with_fallback(Arc::new(BoundedFallback::new(
                Arc::new(similarity),
                config.fallback_timeout(),
            )));
        }

        let rule_set = match &config.rules_path {
            Some(path) => RuleSet::load(path)?,
            None => RuleSet::builtin()?,
        };
        let rules = RuleEngine::new(Arc::new(rule_set)).with_settings(config.adaptation());

        let engine = DialogueEngine::new(nlu, rules)
            .with_question_budget(config.question_budget)
            .with_short_answer_tokens(config.short_answer_tokens);

        tracing::info!(
            vocabulary = engine.nlu().vocabulary().version(),
            concepts = engine.nlu().vocabulary().len(),
            rules = engine.rules().rule_set().rules().len(),
            fallback = config.fallback_enabled,
            "Triage service ready"
        );
        Ok(Self::new(engine))
    }

    pub fn engine(&self) -> &DialogueEngine {
        &self.engine
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Process one message. The session lock is held for the whole turn;
    /// the CPU-bound work runs on the blocking pool.
    pub async fn process_turn(&self, turn: InboundTurn) -> Result<OutboundTurn, TriageError> {
        let (_, handle) = self.registry.resolve(turn.session_id, turn.session_snapshot).await?;
        let mut session = handle.lock_owned().await;
        let engine = Arc::clone(&self.engine);
        let message = turn.message;

        let outcome = tokio::task::spawn_blocking(move || engine.process_message(&mut session, &message))
            .await
            .map_err(|e| TriageError::Task(e.to_string()))??;

        Ok(outcome.into())
    }

    pub async fn reset_session(&self, session_id: Uuid) -> Result<(), TriageError> {
        self.registry.reset(session_id).await?;
        Ok(())
    }

    pub async fn end_session(&self, session_id: Uuid) -> bool {
        self.registry.remove(session_id).await
    }
}
