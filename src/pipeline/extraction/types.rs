use serde::{Deserialize, Serialize};

use crate::models::{CaseField, FieldValue, ProvenanceSource};
use crate::pipeline::vocabulary::{DetectionResult, Span};

/// One extractor hit: a typed value, how sure we are, and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction<T> {
    pub value: T,
    pub confidence: f32,
    /// Byte range into the normalized text.
    pub span: Span,
    pub matched_text: String,
}

impl<T> Extraction<T> {
    /// Build from a byte range of the folded text.
    pub fn at(value: T, confidence: f32, folded: &str, start: usize, end: usize) -> Self {
        Self {
            value,
            confidence,
            span: Span { start, end },
            matched_text: folded.get(start..end).unwrap_or_default().trim().to_string(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Extraction<U> {
        Extraction {
            value: f(self.value),
            confidence: self.confidence,
            span: self.span,
            matched_text: self.matched_text,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }
}

/// Field-level evidence produced from one message, ready for merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEvidence {
    pub field: CaseField,
    pub value: FieldValue,
    pub confidence: f32,
    pub matched_text: String,
    /// Produced by a negation ("no fever"), not by absence.
    pub negated: bool,
    pub source: ProvenanceSource,
}

impl FieldEvidence {
    pub fn new<T>(field: CaseField, extraction: Extraction<T>, to_value: impl FnOnce(T) -> FieldValue) -> Self {
        Self {
            field,
            value: to_value(extraction.value),
            confidence: extraction.confidence,
            matched_text: extraction.matched_text,
            negated: false,
            source: ProvenanceSource::Extracted,
        }
    }

    pub fn from_detection(detection: DetectionResult) -> Self {
        Self {
            field: detection.field,
            value: detection.value,
            confidence: detection.confidence,
            matched_text: detection.matched_text,
            negated: detection.negated,
            source: ProvenanceSource::Extracted,
        }
    }

    /// Mark as derived from another field rather than read from the text.
    pub fn inferred(mut self) -> Self {
        self.source = ProvenanceSource::Inferred;
        self
    }
}

/// Pick the best hit: highest confidence, then earliest position.
pub(crate) fn best_of<T>(hits: Vec<Extraction<T>>) -> Option<Extraction<T>> {
    hits.into_iter().min_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then(a.span.start.cmp(&b.span.start))
    })
}
