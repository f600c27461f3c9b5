//! Concept detection over normalized text.
//!
//! Per concept, three stages run in order and the first stage that yields a
//! surviving candidate decides: phrase (exact, synonym, explicit negative
//! forms), acronym, approximate. Within a stage the best candidate is the
//! one with the highest confidence, then the longest span, then the
//! earliest position.

use std::collections::HashMap;

use crate::models::{CaseField, ConceptCategory};

use super::fuzzy::similarity_above;
use super::negation::NegationRules;
use super::normalize::{normalize, NormalizedText};
use super::types::{ConceptDefinition, DetectionResult, FuzzySettings, MatchKind, Span};

/// A configured phrase with its token form.
#[derive(Debug, Clone)]
pub(crate) struct Phrase {
    pub(crate) joined: String,
    pub(crate) tokens: Vec<String>,
}

/// A concept definition with every phrase pre-tokenized.
#[derive(Debug, Clone)]
pub(crate) struct CompiledConcept {
    pub(crate) definition: ConceptDefinition,
    pub(crate) exact: Vec<Phrase>,
    pub(crate) synonyms: Vec<Phrase>,
    pub(crate) acronyms: Vec<Phrase>,
    pub(crate) approximate: Vec<Phrase>,
    pub(crate) negative_forms: Vec<Phrase>,
    pub(crate) anti_patterns: Vec<Phrase>,
    pub(crate) negation_cues: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Phrase,
    Acronym,
    Approximate,
}

#[derive(Debug, Clone)]
struct Candidate {
    start: usize,
    end: usize,
    kind: MatchKind,
    confidence: f32,
}

/// Immutable, validated concept vocabulary. Built once by the loader and
/// shared read-only between sessions.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    pub(crate) version: String,
    pub(crate) negation: NegationRules,
    pub(crate) fuzzy: FuzzySettings,
    pub(crate) concepts: Vec<CompiledConcept>,
    pub(crate) index: HashMap<String, usize>,
}

impl Vocabulary {
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Replace the similarity floor for approximate matches. Values outside
    /// `[0.5, 1.0]` are clamped.
    pub fn with_similarity_floor(mut self, floor: f32) -> Self {
        self.fuzzy.similarity_floor = floor.clamp(0.5, 1.0);
        self
    }

    pub fn similarity_floor(&self) -> f32 {
        self.fuzzy.similarity_floor
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    pub fn concept(&self, concept_id: &str) -> Option<&ConceptDefinition> {
        self.index.get(concept_id).map(|&i| &self.concepts[i].definition)
    }

    pub fn concept_ids(&self) -> impl Iterator<Item = &str> {
        self.concepts.iter().map(|c| c.definition.id.as_str())
    }

    /// Concepts that write into `field`, in configuration order.
    pub fn concepts_for(&self, field: CaseField) -> impl Iterator<Item = &ConceptDefinition> {
        self.concepts
            .iter()
            .map(|c| &c.definition)
            .filter(move |d| d.field == field)
    }

    pub fn concepts_in(&self, category: ConceptCategory) -> impl Iterator<Item = &ConceptDefinition> {
        self.concepts
            .iter()
            .map(|c| &c.definition)
            .filter(move |d| d.category == category)
    }

    /// Detect one concept in raw text.
    pub fn detect(&self, text: &str, concept_id: &str) -> Option<DetectionResult> {
        let normalized = normalize(text);
        self.detect_normalized(&normalized, concept_id)
    }

    /// Detect one concept in text that was already normalized.
    pub fn detect_normalized(
        &self,
        text: &NormalizedText,
        concept_id: &str,
    ) -> Option<DetectionResult> {
        let concept = self.concepts.get(*self.index.get(concept_id)?)?;
        self.detect_compiled(text, concept)
    }

    /// Every concept found in `text`, in configuration order.
    pub fn detect_all(&self, text: &NormalizedText) -> Vec<DetectionResult> {
        self.concepts
            .iter()
            .filter_map(|c| self.detect_compiled(text, c))
            .collect()
    }

    /// Best detection among the concepts that write into `field`.
    ///
    /// Affirmed detections win over negated ones, so "not progressive,
    /// sudden" yields the sudden onset; otherwise the usual confidence,
    /// span, position order applies.
    pub fn detect_field(&self, text: &NormalizedText, field: CaseField) -> Option<DetectionResult> {
        self.concepts
            .iter()
            .filter(|c| c.definition.field == field)
            .filter_map(|c| self.detect_compiled(text, c))
            .min_by(|a, b| {
                a.negated
                    .cmp(&b.negated)
                    .then(b.confidence.total_cmp(&a.confidence))
                    .then(b.span.len().cmp(&a.span.len()))
                    .then(a.span.start.cmp(&b.span.start))
            })
    }

    fn detect_compiled(
        &self,
        text: &NormalizedText,
        concept: &CompiledConcept,
    ) -> Option<DetectionResult> {
        if text.is_empty() {
            return None;
        }
        for stage in [Stage::Phrase, Stage::Acronym, Stage::Approximate] {
            let best = self
                .candidates(text, concept, stage)
                .into_iter()
                .filter(|c| !self.suppressed(text, concept, c))
                .min_by(|a, b| {
                    b.confidence
                        .total_cmp(&a.confidence)
                        .then((b.end - b.start).cmp(&(a.end - a.start)))
                        .then(a.start.cmp(&b.start))
                });
            if let Some(candidate) = best {
                return Some(self.build_result(text, concept, candidate));
            }
        }
        None
    }

    fn candidates(&self, text: &NormalizedText, concept: &CompiledConcept, stage: Stage) -> Vec<Candidate> {
        let base = concept.definition.confidence;
        let mut out = Vec::new();
        let push_phrases = |phrases: &[Phrase], kind: MatchKind, out: &mut Vec<Candidate>| {
            for phrase in phrases {
                for (start, end) in text.find_phrase(&phrase.tokens) {
                    out.push(Candidate {
                        start,
                        end,
                        kind,
                        confidence: base * kind.weight(),
                    });
                }
            }
        };

        match stage {
            Stage::Phrase => {
                push_phrases(&concept.exact, MatchKind::Exact, &mut out);
                push_phrases(&concept.synonyms, MatchKind::Synonym, &mut out);
                push_phrases(&concept.negative_forms, MatchKind::NegativeForm, &mut out);
            }
            Stage::Acronym => push_phrases(&concept.acronyms, MatchKind::Acronym, &mut out),
            Stage::Approximate => {
                for phrase in &concept.approximate {
                    self.approximate_matches(text, phrase, base, &mut out);
                }
            }
        }
        out
    }

    fn approximate_matches(&self, text: &NormalizedText, phrase: &Phrase, base: f32, out: &mut Vec<Candidate>) {
        let n = phrase.tokens.len();
        if n == 0 || n > text.tokens.len() {
            return;
        }
        for start in 0..=text.tokens.len() - n {
            let end = start + n;
            if text.tokens[start].sentence != text.tokens[end - 1].sentence {
                continue;
            }
            let window = text.tokens[start..end]
                .iter()
                .map(|t| t.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            if let Some(score) = similarity_above(&window, &phrase.joined, self.fuzzy.similarity_floor) {
                out.push(Candidate {
                    start,
                    end,
                    kind: MatchKind::Approximate,
                    confidence: base * MatchKind::Approximate.weight() * score,
                });
            }
        }
    }

    fn suppressed(&self, text: &NormalizedText, concept: &CompiledConcept, candidate: &Candidate) -> bool {
        let sentence = text.tokens[candidate.start].sentence;
        concept
            .anti_patterns
            .iter()
            .any(|anti| text.sentence_contains(sentence, &anti.tokens))
    }

    fn build_result(&self, text: &NormalizedText, concept: &CompiledConcept, c: Candidate) -> DetectionResult {
        let negated = c.kind == MatchKind::NegativeForm
            || self
                .negation
                .is_negated(text, c.start, c.end, &concept.negation_cues);
        let span = Span {
            start: text.tokens[c.start].start,
            end: text.tokens[c.end - 1].end,
        };
        DetectionResult {
            concept_id: concept.definition.id.clone(),
            field: concept.definition.field,
            value: concept.definition.value.to_field_value(negated),
            confidence: c.confidence.clamp(0.0, 1.0),
            span,
            matched_text: text.slice(c.start, c.end).to_string(),
            negated,
            match_kind: c.kind,
        }
    }
}
