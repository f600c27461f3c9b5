use super::types::FieldEvidence;

/// Confidence thresholds used by extraction and the fallback stage
pub mod thresholds {
    /// Below this: extraction likely wrong. Never used on its own.
    pub const VERY_LOW: f32 = 0.30;

    /// Below this: a detection is not reliable enough to record.
    pub const LOW: f32 = 0.50;

    /// Below this: the message as a whole is handed to the semantic fallback.
    pub const MODERATE: f32 = 0.70;

    /// Above this: high confidence. Exact phrase or explicit number.
    pub const HIGH: f32 = 0.85;

    /// Above this: very high confidence. Explicit answer or unambiguous statement.
    pub const VERY_HIGH: f32 = 0.95;
}

/// Aggregate confidence of one message: the weakest field extracted from
/// it. `None` when nothing was extracted.
pub fn aggregate_confidence(evidence: &[FieldEvidence]) -> Option<f32> {
    evidence
        .iter()
        .map(|e| e.confidence)
        .min_by(|a, b| a.total_cmp(b))
}

/// Whether the message should go through the semantic fallback.
/// A message that yielded nothing counts as zero confidence.
pub fn needs_fallback(aggregate: Option<f32>, threshold: f32) -> bool {
    aggregate.unwrap_or(0.0) < threshold
}

/// Evidence below `thresholds::LOW` is dropped before merging.
pub fn is_recordable(evidence: &FieldEvidence) -> bool {
    evidence.confidence >= thresholds::LOW
}
