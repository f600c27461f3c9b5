//! Merge of new field evidence into an existing case.
//!
//! Precedence, from strongest to weakest source:
//!
//! 1. `Answer`: evidence for the field the dialogue just asked about. It
//!    always overwrites, whatever the field held before.
//! 2. `Extracted`: read from the text of a message. Written when the field
//!    is unknown or only holds a fallback hint or an inferred value; an
//!    existing extracted or answered value is kept (first write wins across
//!    turns).
//! 3. `Inferred`: derived from another field. Only fills unknown fields or
//!    replaces a fallback hint.
//! 4. `Fallback`: semantic-similarity hints. Only fill unknown fields.
//!
//! Extracted evidence below `thresholds::LOW` is dropped before it reaches
//! the case.

use serde::{Deserialize, Serialize};

use crate::models::{CaseField, FieldProvenance, FieldValue, HeadacheCase, ProvenanceSource, Sex};
use crate::pipeline::extraction::{is_recordable, profile_from_onset, FieldEvidence};

/// What happened to one piece of evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    /// The field was unknown and now holds the value.
    Recorded,
    /// A weaker value was replaced.
    Overwritten { previous: ProvenanceSource },
    /// An equal or stronger value was already there.
    Kept { existing: ProvenanceSource },
    /// Same value already recorded.
    Unchanged,
    /// Below the recording threshold.
    Dropped,
    /// The value does not fit the field.
    Rejected { reason: String },
}

impl MergeOutcome {
    pub fn changed_case(&self) -> bool {
        matches!(self, Self::Recorded | Self::Overwritten { .. })
    }
}

/// Result of merging one message worth of evidence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    pub outcomes: Vec<(CaseField, MergeOutcome)>,
}

impl MergeReport {
    /// Fields whose value changed.
    pub fn written_fields(&self) -> Vec<CaseField> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.changed_case())
            .map(|(f, _)| *f)
            .collect()
    }

    /// Fields where earlier evidence won over the new one.
    pub fn kept_fields(&self) -> Vec<CaseField> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, MergeOutcome::Kept { .. }))
            .map(|(f, _)| *f)
            .collect()
    }
}

/// Whether evidence from `incoming` may replace a value from `existing`.
pub fn may_overwrite(existing: ProvenanceSource, incoming: ProvenanceSource) -> bool {
    match incoming {
        ProvenanceSource::Answer => true,
        ProvenanceSource::Fallback => false,
        _ => incoming > existing && existing < ProvenanceSource::Extracted,
    }
}

/// Effective source of a piece of evidence: extracted evidence for the field
/// being answered counts as the answer.
pub fn effective_source(evidence: &FieldEvidence, answering: Option<CaseField>) -> ProvenanceSource {
    if evidence.source == ProvenanceSource::Extracted && answering == Some(evidence.field) {
        ProvenanceSource::Answer
    } else {
        evidence.source
    }
}

/// Merge one piece of evidence into `case`.
pub fn merge_evidence(
    case: &mut HeadacheCase,
    evidence: &FieldEvidence,
    answering: Option<CaseField>,
) -> MergeOutcome {
    let source = effective_source(evidence, answering);
    if source == ProvenanceSource::Extracted && !is_recordable(evidence) {
        return MergeOutcome::Dropped;
    }

    let previous = case.provenance_of(evidence.field).map(|p| p.source);
    if let Some(existing) = previous {
        if case.get(evidence.field).as_ref() == Some(&evidence.value) && existing >= source {
            return MergeOutcome::Unchanged;
        }
        if !may_overwrite(existing, source) {
            return MergeOutcome::Kept { existing };
        }
    }

    let mut provenance = FieldProvenance::new(source, evidence.confidence);
    if !evidence.matched_text.is_empty() {
        provenance = provenance.with_text(evidence.matched_text.clone());
    }
    match case.set(evidence.field, evidence.value.clone(), provenance) {
        Ok(()) => match previous {
            Some(previous) => MergeOutcome::Overwritten { previous },
            None => MergeOutcome::Recorded,
        },
        Err(e) => MergeOutcome::Rejected { reason: e.to_string() },
    }
}

/// Merge a batch of evidence, in order, and report each outcome.
pub fn merge_all(
    case: &mut HeadacheCase,
    evidence: &[FieldEvidence],
    answering: Option<CaseField>,
) -> MergeReport {
    let outcomes = evidence
        .iter()
        .map(|e| (e.field, merge_evidence(case, e, answering)))
        .collect();
    MergeReport { outcomes }
}

/// Derive fields that follow from others. Inferred values never replace
/// anything stronger than a fallback hint.
///
/// - profile from onset when no duration or profile cue exists
/// - pregnancy from a known trimester
/// - female sex from pregnancy
pub fn apply_inferences(case: &mut HeadacheCase) -> MergeReport {
    let mut inferred = Vec::new();

    if let Some(onset) = case.onset {
        let confidence = case
            .provenance_of(CaseField::Onset)
            .map(|p| p.confidence * 0.9)
            .unwrap_or(0.5);
        inferred.push(inference(
            CaseField::Profile,
            FieldValue::Text(profile_from_onset(onset).as_str().to_string()),
            confidence,
        ));
    }
    if case.pregnancy_trimester.is_some() {
        inferred.push(inference(CaseField::PregnancyPostpartum, FieldValue::Bool(true), 0.9));
    }
    if case.is_pregnant() {
        inferred.push(inference(
            CaseField::Sex,
            FieldValue::Text(Sex::Female.as_str().to_string()),
            0.9,
        ));
    }

    let mut report = MergeReport::default();
    for evidence in inferred {
        let replaceable = case
            .provenance_of(evidence.field)
            .map_or(true, |p| p.source == ProvenanceSource::Fallback);
        if replaceable {
            let outcome = merge_evidence(case, &evidence, None);
            report.outcomes.push((evidence.field, outcome));
        }
    }
    report
}

fn inference(field: CaseField, value: FieldValue, confidence: f32) -> FieldEvidence {
    FieldEvidence {
        field,
        value,
        confidence,
        matched_text: String::new(),
        negated: false,
        source: ProvenanceSource::Inferred,
    }
}
