use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::{CaseField, FieldValue, HeadacheCase, ProvenanceSource};
use crate::pipeline::extraction::{
    aggregate_confidence, extract_age, extract_duration_hours, extract_flags, extract_headache_profile,
    extract_intensity, extract_onset, extract_profile_with_basis, extract_sex, extract_trimester,
    extract_visual_disturbance, needs_fallback, thresholds, FieldEvidence, ProfileBasis,
};
use crate::pipeline::vocabulary::{normalize, Vocabulary};

use super::fallback::{ExampleMatch, SimilarityFallback};
use super::merge::{apply_inferences, merge_all, MergeReport};

/// What happened with the semantic fallback on one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FallbackStatus {
    /// Extraction was confident enough.
    NotNeeded,
    /// Needed, but no similarity engine is configured.
    NotConfigured,
    /// Consulted, nothing similar enough.
    NoMatch,
    /// Hints from the nearest example were merged.
    Applied {
        example_id: String,
        similarity: f32,
        fields: Vec<CaseField>,
    },
    /// The engine failed or timed out; extractor-only results were kept.
    Unavailable { reason: String },
}

/// Per-message extraction summary returned next to the updated case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    /// Fields the message said something about.
    pub detected_fields: Vec<CaseField>,
    /// Fields whose value changed in the case.
    pub updated_fields: Vec<CaseField>,
    /// Fields where an earlier, stronger value was kept.
    pub kept_fields: Vec<CaseField>,
    /// Fields derived from others after the merge.
    pub inferred_fields: Vec<CaseField>,
    /// Minimum confidence over the extracted evidence, if any.
    pub aggregate_confidence: Option<f32>,
    pub fallback: FallbackStatus,
    /// Field the message was treated as answering.
    pub answering: Option<CaseField>,
}

impl ExtractionMetadata {
    /// Metadata for a reply interpreted directly as the answer to `field`,
    /// without running the extractors.
    pub fn direct_answer(field: CaseField, recorded: bool) -> Self {
        Self {
            detected_fields: vec![field],
            updated_fields: if recorded { vec![field] } else { Vec::new() },
            kept_fields: Vec::new(),
            inferred_fields: Vec::new(),
            aggregate_confidence: recorded.then_some(1.0),
            fallback: FallbackStatus::NotNeeded,
            answering: Some(field),
        }
    }
}

/// Runs every extractor over a message and merges the result into a case.
#[derive(Clone)]
pub struct NluOrchestrator {
    vocabulary: Arc<Vocabulary>,
    fallback: Option<Arc<dyn SimilarityFallback>>,
    threshold: f32,
}

impl NluOrchestrator {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self {
            vocabulary,
            fallback: None,
            threshold: thresholds::MODERATE,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn SimilarityFallback>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Aggregate confidence below which the fallback is consulted.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// All evidence in one message, one entry per field at most.
    pub fn collect_evidence(&self, text: &str) -> Vec<FieldEvidence> {
        let vocabulary = self.vocabulary.as_ref();
        let normalized = normalize(text);
        let mut evidence = Vec::new();

        if let Some(age) = extract_age(text) {
            evidence.push(FieldEvidence::new(CaseField::Age, age, |v| FieldValue::Number(v as f64)));
        }
        if let Some(sex) = extract_sex(text) {
            evidence.push(FieldEvidence::new(CaseField::Sex, sex, |v| text_value(v.as_str())));
        }
        if let Some(onset) = extract_onset(vocabulary, text) {
            evidence.push(FieldEvidence::new(CaseField::Onset, onset, |v| text_value(v.as_str())));
        }
        if let Some((profile, basis)) = extract_profile_with_basis(vocabulary, text) {
            let profile = FieldEvidence::new(CaseField::Profile, profile, |v| text_value(v.as_str()));
            evidence.push(match basis {
                ProfileBasis::Onset => profile.inferred(),
                _ => profile,
            });
        }
        if let Some(duration) = extract_duration_hours(text) {
            evidence.push(FieldEvidence::new(CaseField::DurationHours, duration, FieldValue::Number));
        }
        if let Some(intensity) = extract_intensity(text) {
            evidence.push(FieldEvidence::new(CaseField::Intensity, intensity, |v| {
                FieldValue::Number(v as f64)
            }));
        }
        if let Some(trimester) = extract_trimester(text) {
            evidence.push(FieldEvidence::new(CaseField::PregnancyTrimester, trimester, |v| {
                FieldValue::Number(v as f64)
            }));
        }
        evidence.extend(extract_flags(vocabulary, &normalized));
        if let Some(phenotype) = extract_headache_profile(vocabulary, &normalized) {
            evidence.push(FieldEvidence::new(CaseField::HeadacheProfile, phenotype, |v| {
                text_value(v.as_str())
            }));
        }
        if let Some(visual) = extract_visual_disturbance(vocabulary, &normalized) {
            evidence.push(FieldEvidence::new(CaseField::VisualDisturbance, visual, |v| {
                text_value(v.as_str())
            }));
        }

        evidence
    }

    /// Extract `text` on top of `existing` and return the updated copy.
    pub fn extract(&self, text: &str, existing: &HeadacheCase) -> (HeadacheCase, ExtractionMetadata) {
        self.extract_with_context(text, existing, None)
    }

    /// Like [`extract`](Self::extract), treating the message as the answer
    /// to `answering`: evidence for that field overwrites what was there.
    pub fn extract_with_context(
        &self,
        text: &str,
        existing: &HeadacheCase,
        answering: Option<CaseField>,
    ) -> (HeadacheCase, ExtractionMetadata) {
        let mut case = existing.clone();
        let metadata = self.extract_into(text, &mut case, answering);
        (case, metadata)
    }

    /// Extract `text` and merge into `case` in place.
    pub fn extract_into(
        &self,
        text: &str,
        case: &mut HeadacheCase,
        answering: Option<CaseField>,
    ) -> ExtractionMetadata {
        let evidence = self.collect_evidence(text);
        let stated: Vec<FieldEvidence> = evidence
            .iter()
            .filter(|e| e.source == ProvenanceSource::Extracted)
            .cloned()
            .collect();
        let aggregate = aggregate_confidence(&stated);

        let mut report = merge_all(case, &evidence, answering);

        let fallback = if needs_fallback(aggregate, self.threshold) {
            let (status, hints) = self.consult_fallback(text, case);
            report.outcomes.extend(hints.outcomes);
            status
        } else {
            FallbackStatus::NotNeeded
        };

        let inferred = apply_inferences(case);

        let metadata = ExtractionMetadata {
            detected_fields: evidence.iter().map(|e| e.field).collect(),
            updated_fields: report.written_fields(),
            kept_fields: report.kept_fields(),
            inferred_fields: inferred.written_fields(),
            aggregate_confidence: aggregate,
            fallback,
            answering,
        };

        tracing::debug!(
            detected = metadata.detected_fields.len(),
            updated = metadata.updated_fields.len(),
            aggregate = ?metadata.aggregate_confidence,
            "Message extracted"
        );
        metadata
    }

    fn consult_fallback(&self, text: &str, case: &mut HeadacheCase) -> (FallbackStatus, MergeReport) {
        let Some(fallback) = &self.fallback else {
            return (FallbackStatus::NotConfigured, MergeReport::default());
        };
        match fallback.nearest_example(text) {
            Ok(Some(example)) => {
                let report = merge_all(case, &hint_evidence(&example), None);
                let fields = report.written_fields();
                tracing::debug!(
                    engine = fallback.name(),
                    example = %example.example_id,
                    similarity = example.similarity,
                    hints = fields.len(),
                    "Semantic fallback applied"
                );
                let status = FallbackStatus::Applied {
                    example_id: example.example_id,
                    similarity: example.similarity,
                    fields,
                };
                (status, report)
            }
            Ok(None) => (FallbackStatus::NoMatch, MergeReport::default()),
            Err(e) => {
                tracing::warn!(
                    engine = fallback.name(),
                    error = %e,
                    "Semantic fallback unavailable, using extractor results only"
                );
                (FallbackStatus::Unavailable { reason: e.to_string() }, MergeReport::default())
            }
        }
    }
}

/// The example's annotations as low-priority hints, weighted by similarity.
fn hint_evidence(example: &ExampleMatch) -> Vec<FieldEvidence> {
    example
        .fields
        .iter()
        .map(|(field, value)| FieldEvidence {
            field: *field,
            value: value.clone(),
            confidence: example.similarity,
            matched_text: String::new(),
            negated: false,
            source: ProvenanceSource::Fallback,
        })
        .collect()
}

fn text_value(s: &str) -> FieldValue {
    FieldValue::Text(s.to_string())
}
