use serde::{Deserialize, Serialize};

use crate::models::{CaseField, ConceptCategory, FieldValue};

// ═══════════════════════════════════════════════════════════
// Configuration shapes (as written in vocabulary JSON)
// ═══════════════════════════════════════════════════════════

/// Pattern variants for one concept, tried in this order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternSet {
    #[serde(default)]
    pub exact: Vec<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    /// Single-token abbreviations, matched on whole tokens only.
    #[serde(default)]
    pub acronyms: Vec<String>,
    /// Extra forms that are only ever matched approximately.
    #[serde(default)]
    pub fuzzy: Vec<String>,
}

impl PatternSet {
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
            && self.synonyms.is_empty()
            && self.acronyms.is_empty()
            && self.fuzzy.is_empty()
    }
}

/// What a concept asserts when it is found un-negated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConceptValue {
    Flag(bool),
    Category(String),
}

impl ConceptValue {
    pub fn to_field_value(&self, negated: bool) -> FieldValue {
        match self {
            Self::Flag(b) => FieldValue::Bool(if negated { !b } else { *b }),
            Self::Category(c) => FieldValue::Text(c.clone()),
        }
    }
}

fn default_concept_value() -> ConceptValue {
    ConceptValue::Flag(true)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConceptDefinition {
    pub id: String,
    pub category: ConceptCategory,
    pub field: CaseField,
    #[serde(default = "default_concept_value")]
    pub value: ConceptValue,
    /// Confidence of an exact match; other match kinds scale it down.
    pub confidence: f32,
    pub patterns: PatternSet,
    /// Words that state the negative outright ("afebrile", "nuque souple").
    #[serde(default)]
    pub negative_forms: Vec<String>,
    /// A match is discarded when one of these occurs in the same sentence.
    #[serde(default)]
    pub anti_patterns: Vec<String>,
    /// Concept-specific negation cues, added to the global set.
    #[serde(default)]
    pub negation_cues: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NegationSettings {
    /// Cues looked for before a match.
    pub cues: Vec<String>,
    /// Cues looked for right after a match ("kernig negative").
    #[serde(default)]
    pub post_cues: Vec<String>,
    /// Answers written after a colon ("fever: no").
    #[serde(default)]
    pub colon_cues: Vec<String>,
    /// Tokens that end the negation scope ("but", "mais").
    #[serde(default)]
    pub scope_breakers: Vec<String>,
    pub window: usize,
    #[serde(default = "default_post_window")]
    pub post_window: usize,
}

fn default_post_window() -> usize {
    2
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FuzzySettings {
    pub similarity_floor: f32,
    pub min_form_length: usize,
}

impl Default for FuzzySettings {
    fn default() -> Self {
        Self {
            similarity_floor: 0.90,
            min_form_length: 6,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Detection output
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Synonym,
    NegativeForm,
    Acronym,
    Approximate,
}

impl MatchKind {
    /// Multiplier applied to the concept's base confidence.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Exact | Self::NegativeForm => 1.0,
            Self::Synonym => 0.95,
            Self::Acronym => 0.90,
            Self::Approximate => 0.85,
        }
    }
}

/// Byte range into the normalized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub concept_id: String,
    pub field: CaseField,
    pub value: FieldValue,
    pub confidence: f32,
    pub span: Span,
    pub matched_text: String,
    pub negated: bool,
    pub match_kind: MatchKind,
}

impl DetectionResult {
    /// Reliable enough to record without confirmation.
    pub fn is_reliable(&self) -> bool {
        self.confidence >= crate::pipeline::extraction::thresholds::LOW
    }
}
