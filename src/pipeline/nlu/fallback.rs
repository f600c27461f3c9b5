//! Semantic-similarity fallback for messages the extractors could not read
//! with enough confidence.
//!
//! The orchestrator only sees [`SimilarityFallback`]. The crate ships a
//! lexical implementation over the annotated corpus; a model-backed one can
//! be plugged in behind the same trait and wrapped in [`BoundedFallback`]
//! so that a slow lookup never holds up a turn.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::{CaseField, FieldValue};
use crate::pipeline::vocabulary::normalize;

use super::corpus::ExampleCorpus;
use super::FallbackError;

/// Default minimum cosine similarity for a lexical match.
pub const DEFAULT_MIN_SIMILARITY: f32 = 0.35;

/// Default time budget for one lookup.
pub const DEFAULT_FALLBACK_TIMEOUT: Duration = Duration::from_millis(250);

/// Nearest annotated example for a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleMatch {
    pub example_id: String,
    pub similarity: f32,
    pub fields: BTreeMap<CaseField, FieldValue>,
}

/// Narrow interface to a similarity engine.
pub trait SimilarityFallback: Send + Sync {
    /// Nearest example to `text`, or `None` when nothing is similar enough.
    fn nearest_example(&self, text: &str) -> Result<Option<ExampleMatch>, FallbackError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

// ═══════════════════════════════════════════════════════════
// Lexical similarity over the example corpus
// ═══════════════════════════════════════════════════════════

/// Words that carry no clinical meaning on their own.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "of", "to", "in", "on", "at", "my", "me", "i", "is", "it", "was",
    "with", "for", "has", "have", "had", "be", "am", "are", "this", "that", "very", "so", "but",
    "le", "la", "les", "un", "une", "des", "de", "du", "et", "ou", "en", "au", "aux", "je", "il",
    "elle", "est", "a", "avec", "pour", "sur", "ma", "mon", "mes", "tres", "qui", "que", "ca",
];

/// Prefix length used as a crude stem ("worsening" and "worse" meet).
const STEM_CHARS: usize = 5;

type TermVector = HashMap<String, f32>;

fn term_vector(text: &str) -> TermVector {
    let mut terms = TermVector::new();
    for token in normalize(text).tokens {
        if token.text.len() < 2 || STOPWORDS.contains(&token.text.as_str()) {
            continue;
        }
        let stem: String = token.text.chars().take(STEM_CHARS).collect();
        *terms.entry(stem).or_insert(0.0) += 1.0;
    }
    terms
}

fn norm(vector: &TermVector) -> f32 {
    vector.values().map(|v| v * v).sum::<f32>().sqrt()
}

fn cosine(a: &TermVector, a_norm: f32, b: &TermVector, b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a
        .iter()
        .filter_map(|(term, weight)| b.get(term).map(|other| weight * other))
        .sum();
    dot / (a_norm * b_norm)
}

/// Bag-of-words cosine similarity against the annotated corpus. Fully
/// deterministic: ties go to the earlier example.
pub struct LexicalSimilarity {
    corpus: Arc<ExampleCorpus>,
    vectors: Vec<(TermVector, f32)>,
    min_similarity: f32,
}

impl LexicalSimilarity {
    pub fn new(corpus: Arc<ExampleCorpus>) -> Self {
        let vectors = corpus
            .examples()
            .iter()
            .map(|example| {
                let vector = term_vector(&example.text);
                let n = norm(&vector);
                (vector, n)
            })
            .collect();
        Self {
            corpus,
            vectors,
            min_similarity: DEFAULT_MIN_SIMILARITY,
        }
    }

    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity;
        self
    }
}

impl SimilarityFallback for LexicalSimilarity {
    fn nearest_example(&self, text: &str) -> Result<Option<ExampleMatch>, FallbackError> {
        let query = term_vector(text);
        let query_norm = norm(&query);
        if query_norm == 0.0 {
            return Ok(None);
        }

        let mut best: Option<(usize, f32)> = None;
        for (index, (vector, vector_norm)) in self.vectors.iter().enumerate() {
            let score = cosine(&query, query_norm, vector, *vector_norm);
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((index, score));
            }
        }

        let Some((index, similarity)) = best else {
            return Ok(None);
        };
        if similarity < self.min_similarity {
            return Ok(None);
        }
        let example = &self.corpus.examples()[index];
        Ok(Some(ExampleMatch {
            example_id: example.id.clone(),
            similarity,
            fields: example.fields.clone(),
        }))
    }

    fn name(&self) -> &str {
        "lexical"
    }
}

// ═══════════════════════════════════════════════════════════
// Time-bounded wrapper
// ═══════════════════════════════════════════════════════════

/// Runs the inner lookup on a worker thread and gives up after `timeout`.
/// A late result is discarded when the worker eventually finishes.
pub struct BoundedFallback {
    inner: Arc<dyn SimilarityFallback>,
    timeout: Duration,
}

impl BoundedFallback {
    pub fn new(inner: Arc<dyn SimilarityFallback>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl SimilarityFallback for BoundedFallback {
    fn nearest_example(&self, text: &str) -> Result<Option<ExampleMatch>, FallbackError> {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let text = text.to_string();

        std::thread::Builder::new()
            .name("similarity-fallback".into())
            .spawn(move || {
                // Receiver may be gone after a timeout
                let _ = tx.send(inner.nearest_example(&text));
            })
            .map_err(|e| FallbackError::Unavailable(format!("cannot start worker: {e}")))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(FallbackError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(FallbackError::Unavailable(format!(
                "{} worker exited without a result",
                self.inner.name()
            ))),
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

// ═══════════════════════════════════════════════════════════
// Mock for testing
// ═══════════════════════════════════════════════════════════

/// Scripted fallback for tests: returns a fixed result, optionally after a
/// delay, and counts calls.
pub struct MockFallback {
    result: Mutex<Result<Option<ExampleMatch>, FallbackError>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockFallback {
    pub fn returning(example: Option<ExampleMatch>) -> Self {
        Self {
            result: Mutex::new(Ok(example)),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: FallbackError) -> Self {
        Self {
            result: Mutex::new(Err(error)),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SimilarityFallback for MockFallback {
    fn nearest_example(&self, _text: &str) -> Result<Option<ExampleMatch>, FallbackError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.result
            .lock()
            .map_err(|_| FallbackError::Unavailable("mock lock poisoned".into()))?
            .clone()
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexical() -> LexicalSimilarity {
        LexicalSimilarity::new(Arc::new(ExampleCorpus::builtin().unwrap()))
    }

    fn sample_match() -> ExampleMatch {
        ExampleMatch {
            example_id: "fever_burning_up".into(),
            similarity: 0.8,
            fields: BTreeMap::from([(CaseField::Fever, FieldValue::Bool(true))]),
        }
    }

    #[test]
    fn trait_is_object_safe() {
        fn _assert_object_safe(_: &dyn SimilarityFallback) {}
    }

    #[test]
    fn lexical_finds_paraphrase() {
        let m = lexical()
            .nearest_example("it feels like a tight band squeezing my head")
            .unwrap()
            .expect("a match");
        assert_eq!(m.example_id, "tension_band");
        assert_eq!(
            m.fields.get(&CaseField::HeadacheProfile),
            Some(&FieldValue::Text("tension_like".into()))
        );
    }

    #[test]
    fn lexical_is_deterministic() {
        let fallback = lexical();
        let text = "I fell and banged my head on the stairs";
        let first = fallback.nearest_example(text).unwrap();
        let second = fallback.nearest_example(text).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unrelated_text_has_no_match() {
        assert!(lexical().nearest_example("quarterly invoice totals").unwrap().is_none());
        assert!(lexical().nearest_example("").unwrap().is_none());
    }

    #[test]
    fn bounded_returns_fast_results() {
        let inner = Arc::new(MockFallback::returning(Some(sample_match())));
        let bounded = BoundedFallback::new(inner.clone(), Duration::from_millis(500));
        let result = bounded.nearest_example("anything").unwrap();
        assert_eq!(result, Some(sample_match()));
        assert_eq!(inner.calls(), 1);
    }

    #[test]
    fn bounded_times_out_slow_lookup() {
        let inner = Arc::new(MockFallback::returning(Some(sample_match())).with_delay(Duration::from_millis(300)));
        let bounded = BoundedFallback::new(inner, Duration::from_millis(20));
        assert!(matches!(
            bounded.nearest_example("anything"),
            Err(FallbackError::Timeout(_))
        ));
    }

    #[test]
    fn bounded_passes_errors_through() {
        let inner = Arc::new(MockFallback::failing(FallbackError::Unavailable("offline".into())));
        let bounded = BoundedFallback::new(inner, DEFAULT_FALLBACK_TIMEOUT);
        assert_eq!(
            bounded.nearest_example("anything"),
            Err(FallbackError::Unavailable("offline".into()))
        );
    }
}
