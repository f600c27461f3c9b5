//! Yes/no clinical findings and the headache phenotype, read from the
//! concept vocabulary.

use crate::models::{CaseField, FieldValue, HeadachePhenotype, VisualDisturbance};
use crate::pipeline::vocabulary::{normalize, NormalizedText, Vocabulary};

use super::types::{Extraction, FieldEvidence};

/// Boolean fields that are filled from vocabulary concepts.
pub const FLAG_FIELDS: &[CaseField] = &[
    CaseField::Fever,
    CaseField::MeningealSigns,
    CaseField::NeuroDeficit,
    CaseField::Seizure,
    CaseField::HticPattern,
    CaseField::PregnancyPostpartum,
    CaseField::Trauma,
    CaseField::RecentLumbarPuncture,
    CaseField::Immunosuppression,
    CaseField::CancerHistory,
    CaseField::RecentPatternChange,
    CaseField::HortonCriteria,
];

/// One boolean field from raw text. `Some(false)` evidence comes only from
/// an explicit negation, never from silence.
pub fn extract_flag(vocabulary: &Vocabulary, text: &str, field: CaseField) -> Option<FieldEvidence> {
    if !field.is_boolean() {
        return None;
    }
    let normalized = normalize(text);
    vocabulary
        .detect_field(&normalized, field)
        .map(FieldEvidence::from_detection)
}

/// Every boolean field the text says something about.
pub fn extract_flags(vocabulary: &Vocabulary, text: &NormalizedText) -> Vec<FieldEvidence> {
    FLAG_FIELDS
        .iter()
        .filter_map(|field| vocabulary.detect_field(text, *field))
        .filter(|d| matches!(d.value, FieldValue::Bool(_)))
        .map(FieldEvidence::from_detection)
        .collect()
}

/// Primary headache phenotype ("migraine", "cluster headache").
/// A negated phenotype ("not like my migraines") tells us nothing.
pub fn extract_headache_profile(
    vocabulary: &Vocabulary,
    text: &NormalizedText,
) -> Option<Extraction<HeadachePhenotype>> {
    let detection = vocabulary.detect_field(text, CaseField::HeadacheProfile)?;
    if detection.negated {
        return None;
    }
    let phenotype = detection.value.as_text()?.parse::<HeadachePhenotype>().ok()?;
    Some(Extraction {
        value: phenotype,
        confidence: detection.confidence,
        span: detection.span,
        matched_text: detection.matched_text,
    })
}

/// Kind of visual symptom. "No blurred vision" rules out one kind, not all
/// of them, so a negated detection is dropped; "no visual symptoms" is its
/// own concept.
pub fn extract_visual_disturbance(
    vocabulary: &Vocabulary,
    text: &NormalizedText,
) -> Option<Extraction<VisualDisturbance>> {
    let detection = vocabulary.detect_field(text, CaseField::VisualDisturbance)?;
    if detection.negated {
        return None;
    }
    let kind = detection.value.as_text()?.parse::<VisualDisturbance>().ok()?;
    Some(Extraction {
        value: kind,
        confidence: detection.confidence,
        span: detection.span,
        matched_text: detection.matched_text,
    })
}
