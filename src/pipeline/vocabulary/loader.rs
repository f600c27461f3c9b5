//! Vocabulary configuration loading and validation.
//!
//! Every concept is checked at load time; the first malformed entry aborts
//! loading with an error naming it.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::models::FieldKind;

use super::matcher::{CompiledConcept, Phrase, Vocabulary};
use super::negation::NegationRules;
use super::normalize::phrase_tokens;
use super::types::{ConceptDefinition, ConceptValue, FuzzySettings, NegationSettings};
use super::VocabularyError;

const BUILTIN_VOCABULARY: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/resources/vocabulary.json"));

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VocabularyFile {
    version: String,
    negation: NegationSettings,
    #[serde(default)]
    fuzzy: FuzzySettings,
    concepts: Vec<serde_json::Value>,
}

impl Vocabulary {
    /// The vocabulary shipped with the crate.
    pub fn builtin() -> Result<Self, VocabularyError> {
        Self::from_json(BUILTIN_VOCABULARY)
    }

    /// Load an override vocabulary from disk.
    pub fn load(path: &Path) -> Result<Self, VocabularyError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| VocabularyError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    pub fn from_json(json: &str) -> Result<Self, VocabularyError> {
        let file: VocabularyFile =
            serde_json::from_str(json).map_err(|e| VocabularyError::Parse(e.to_string()))?;
        validate_settings(&file)?;

        let mut concepts = Vec::with_capacity(file.concepts.len());
        let mut index = HashMap::new();
        for (position, raw) in file.concepts.into_iter().enumerate() {
            let label = entry_label(&raw, position);
            let definition: ConceptDefinition = serde_json::from_value(raw).map_err(|e| {
                VocabularyError::InvalidConcept {
                    concept: label.clone(),
                    reason: e.to_string(),
                }
            })?;
            let compiled = compile_concept(definition, &file.fuzzy)?;
            if index
                .insert(compiled.definition.id.clone(), concepts.len())
                .is_some()
            {
                return Err(VocabularyError::DuplicateConcept(compiled.definition.id));
            }
            concepts.push(compiled);
        }

        tracing::info!(
            version = %file.version,
            concepts = concepts.len(),
            "Vocabulary loaded"
        );

        Ok(Vocabulary {
            version: file.version,
            negation: NegationRules::compile(&file.negation),
            fuzzy: file.fuzzy,
            concepts,
            index,
        })
    }
}

/// "fever" when the entry has a usable id, "#3" otherwise.
fn entry_label(raw: &serde_json::Value, position: usize) -> String {
    raw.get("id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{position}"))
}

fn validate_settings(file: &VocabularyFile) -> Result<(), VocabularyError> {
    if file.version.trim().is_empty() {
        return Err(VocabularyError::InvalidSettings("version is empty".into()));
    }
    if file.negation.cues.is_empty() {
        return Err(VocabularyError::InvalidSettings("negation cue list is empty".into()));
    }
    if file.negation.window == 0 {
        return Err(VocabularyError::InvalidSettings("negation window must be at least 1".into()));
    }
    let floor = file.fuzzy.similarity_floor;
    if !(0.5..=1.0).contains(&floor) {
        return Err(VocabularyError::InvalidSettings(format!(
            "fuzzy similarity floor {floor} outside [0.5, 1.0]"
        )));
    }
    if file.fuzzy.min_form_length == 0 {
        return Err(VocabularyError::InvalidSettings("fuzzy min_form_length must be at least 1".into()));
    }
    Ok(())
}

fn compile_concept(
    definition: ConceptDefinition,
    fuzzy: &FuzzySettings,
) -> Result<CompiledConcept, VocabularyError> {
    let invalid = |reason: String| VocabularyError::InvalidConcept {
        concept: definition.id.clone(),
        reason,
    };

    if definition.id.trim().is_empty() {
        return Err(invalid("id is empty".into()));
    }
    if !(definition.confidence > 0.0 && definition.confidence <= 1.0) {
        return Err(invalid(format!(
            "confidence {} outside (0, 1]",
            definition.confidence
        )));
    }
    if definition.patterns.is_empty() {
        return Err(invalid("no patterns".into()));
    }

    match (definition.field.kind(), &definition.value) {
        (FieldKind::Boolean, ConceptValue::Flag(true)) => {}
        (FieldKind::Boolean, other) => {
            return Err(invalid(format!(
                "boolean field {} needs value true, got {other:?}",
                definition.field
            )))
        }
        (FieldKind::Categorical(allowed), ConceptValue::Category(value)) => {
            if !allowed.contains(&value.as_str()) {
                return Err(invalid(format!(
                    "value {value} is not one of [{}]",
                    allowed.join(", ")
                )));
            }
            if !definition.negative_forms.is_empty() {
                return Err(invalid("negative forms only apply to boolean fields".into()));
            }
        }
        (FieldKind::Categorical(_), other) => {
            return Err(invalid(format!(
                "field {} needs a category value, got {other:?}",
                definition.field
            )))
        }
        (FieldKind::Numeric { .. }, _) => {
            return Err(invalid(format!(
                "numeric field {} cannot be driven by a concept",
                definition.field
            )))
        }
    }

    let compile = |forms: &[String], what: &str| -> Result<Vec<Phrase>, VocabularyError> {
        forms
            .iter()
            .map(|form| {
                let tokens = phrase_tokens(form);
                if tokens.is_empty() {
                    return Err(invalid(format!("{what} form {form:?} has no tokens")));
                }
                Ok(Phrase {
                    joined: tokens.join(" "),
                    tokens,
                })
            })
            .collect()
    };

    let exact = compile(&definition.patterns.exact, "exact")?;
    let synonyms = compile(&definition.patterns.synonyms, "synonym")?;
    let acronyms = compile(&definition.patterns.acronyms, "acronym")?;
    if let Some(bad) = acronyms.iter().find(|a| a.tokens.len() != 1) {
        return Err(invalid(format!("acronym {:?} must be a single token", bad.joined)));
    }
    let fuzzy_only = compile(&definition.patterns.fuzzy, "fuzzy")?;
    let negative_forms = compile(&definition.negative_forms, "negative")?;
    let anti_patterns = compile(&definition.anti_patterns, "anti-pattern")?;

    let mut approximate: Vec<Phrase> = Vec::new();
    for phrase in exact.iter().chain(&synonyms).chain(&fuzzy_only) {
        let long_enough = phrase.joined.chars().count() >= fuzzy.min_form_length;
        if long_enough && !approximate.iter().any(|p| p.joined == phrase.joined) {
            approximate.push(phrase.clone());
        }
    }

    let negation_cues = definition
        .negation_cues
        .iter()
        .map(|c| phrase_tokens(c))
        .filter(|t| !t.is_empty())
        .collect();

    Ok(CompiledConcept {
        definition,
        exact,
        synonyms,
        acronyms,
        approximate,
        negative_forms,
        anti_patterns,
        negation_cues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CaseField, ConceptCategory};

    fn minimal(concepts: serde_json::Value) -> String {
        serde_json::json!({
            "version": "test",
            "negation": { "cues": ["no"], "window": 3 },
            "concepts": concepts
        })
        .to_string()
    }

    #[test]
    fn builtin_vocabulary_loads() {
        let v = Vocabulary::builtin().unwrap();
        assert!(!v.is_empty());
        assert!(!v.version().is_empty());
        for id in ["fever", "meningeal_signs", "onset_thunderclap", "pregnancy_postpartum"] {
            assert!(v.concept(id).is_some(), "missing concept {id}");
        }
    }

    #[test]
    fn builtin_covers_every_boolean_field() {
        let v = Vocabulary::builtin().unwrap();
        for field in CaseField::all().iter().filter(|f| f.is_boolean()) {
            assert!(v.concepts_for(*field).next().is_some(), "no concept for {field}");
        }
        assert!(v.concepts_in(ConceptCategory::RedFlag).count() >= 5);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = Vocabulary::from_json("{ not json").unwrap_err();
        assert!(matches!(err, VocabularyError::Parse(_)));
    }

    #[test]
    fn missing_required_key_names_the_entry() {
        let json = minimal(serde_json::json!([
            { "id": "fever", "category": "red_flag", "field": "fever", "patterns": { "exact": ["fever"] } }
        ]));
        match Vocabulary::from_json(&json).unwrap_err() {
            VocabularyError::InvalidConcept { concept, reason } => {
                assert_eq!(concept, "fever");
                assert!(reason.contains("confidence"), "reason was {reason}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn entry_without_id_is_named_by_position() {
        let json = minimal(serde_json::json!([{ "category": "red_flag" }]));
        match Vocabulary::from_json(&json).unwrap_err() {
            VocabularyError::InvalidConcept { concept, .. } => assert_eq!(concept, "#0"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let concept = serde_json::json!({
            "id": "fever", "category": "red_flag", "field": "fever",
            "confidence": 0.9, "patterns": { "exact": ["fever"] }
        });
        let json = minimal(serde_json::json!([concept.clone(), concept]));
        assert!(matches!(
            Vocabulary::from_json(&json).unwrap_err(),
            VocabularyError::DuplicateConcept(id) if id == "fever"
        ));
    }

    #[test]
    fn category_must_belong_to_field() {
        let json = minimal(serde_json::json!([{
            "id": "onset_weird", "category": "profile", "field": "onset", "value": "sideways",
            "confidence": 0.9, "patterns": { "exact": ["sideways"] }
        }]));
        assert!(matches!(
            Vocabulary::from_json(&json).unwrap_err(),
            VocabularyError::InvalidConcept { .. }
        ));
    }

    #[test]
    fn numeric_fields_cannot_be_concepts() {
        let json = minimal(serde_json::json!([{
            "id": "age_word", "category": "context", "field": "age",
            "confidence": 0.9, "patterns": { "exact": ["old"] }
        }]));
        assert!(Vocabulary::from_json(&json).is_err());
    }

    #[test]
    fn multi_token_acronym_is_rejected() {
        let json = minimal(serde_json::json!([{
            "id": "fever", "category": "red_flag", "field": "fever",
            "confidence": 0.9, "patterns": { "acronyms": ["t c"] }
        }]));
        assert!(Vocabulary::from_json(&json).is_err());
    }

    #[test]
    fn confidence_out_of_range_is_rejected() {
        let json = minimal(serde_json::json!([{
            "id": "fever", "category": "red_flag", "field": "fever",
            "confidence": 1.4, "patterns": { "exact": ["fever"] }
        }]));
        assert!(Vocabulary::from_json(&json).is_err());
    }

    #[test]
    fn zero_window_is_rejected() {
        let json = serde_json::json!({
            "version": "test",
            "negation": { "cues": ["no"], "window": 0 },
            "concepts": []
        })
        .to_string();
        assert!(matches!(
            Vocabulary::from_json(&json).unwrap_err(),
            VocabularyError::InvalidSettings(_)
        ));
    }

    #[test]
    fn load_reads_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocabulary.json");
        std::fs::write(
            &path,
            minimal(serde_json::json!([{
                "id": "fever", "category": "red_flag", "field": "fever",
                "confidence": 0.9, "patterns": { "exact": ["calenture"] }
            }])),
        )
        .unwrap();
        let v = Vocabulary::load(&path).unwrap();
        assert!(v.detect("calenture", "fever").is_some());
        assert!(v.detect("fever", "fever").is_none());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Vocabulary::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, VocabularyError::Io(_)));
    }
}
