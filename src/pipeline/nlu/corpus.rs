//! Annotated example sentences used by the semantic fallback.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::{CaseField, FieldProvenance, FieldValue, HeadacheCase, ProvenanceSource};

use super::CorpusError;

const BUILTIN_EXAMPLES: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/resources/examples.json"));

/// One annotated sentence: what a clinician would record from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnnotatedExample {
    pub id: String,
    pub text: String,
    pub fields: BTreeMap<CaseField, FieldValue>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CorpusFile {
    version: String,
    examples: Vec<serde_json::Value>,
}

/// Validated, immutable example corpus.
#[derive(Debug, Clone)]
pub struct ExampleCorpus {
    version: String,
    examples: Vec<AnnotatedExample>,
}

impl ExampleCorpus {
    pub fn builtin() -> Result<Self, CorpusError> {
        Self::from_json(BUILTIN_EXAMPLES)
    }

    pub fn load(path: &Path) -> Result<Self, CorpusError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CorpusError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    pub fn from_json(json: &str) -> Result<Self, CorpusError> {
        let file: CorpusFile =
            serde_json::from_str(json).map_err(|e| CorpusError::Parse(e.to_string()))?;

        let mut seen = HashSet::new();
        let mut examples = Vec::with_capacity(file.examples.len());
        for (position, raw) in file.examples.into_iter().enumerate() {
            let label = raw
                .get("id")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{position}"));
            let example: AnnotatedExample =
                serde_json::from_value(raw).map_err(|e| CorpusError::InvalidExample {
                    example: label.clone(),
                    reason: e.to_string(),
                })?;
            validate_example(&example)?;
            if !seen.insert(example.id.clone()) {
                return Err(CorpusError::DuplicateExample(example.id));
            }
            examples.push(example);
        }

        tracing::info!(version = %file.version, examples = examples.len(), "Example corpus loaded");
        Ok(Self {
            version: file.version,
            examples,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn examples(&self) -> &[AnnotatedExample] {
        &self.examples
    }

    pub fn get(&self, id: &str) -> Option<&AnnotatedExample> {
        self.examples.iter().find(|e| e.id == id)
    }
}

/// Every annotated value must be storable in a case.
fn validate_example(example: &AnnotatedExample) -> Result<(), CorpusError> {
    let invalid = |reason: String| CorpusError::InvalidExample {
        example: example.id.clone(),
        reason,
    };
    if example.id.trim().is_empty() {
        return Err(invalid("empty id".into()));
    }
    if example.text.trim().is_empty() {
        return Err(invalid("empty text".into()));
    }
    if example.fields.is_empty() {
        return Err(invalid("no annotated fields".into()));
    }
    let mut scratch = HeadacheCase::new();
    for (field, value) in &example.fields {
        scratch
            .set(*field, value.clone(), FieldProvenance::new(ProvenanceSource::Fallback, 1.0))
            .map_err(|e| invalid(e.to_string()))?;
    }
    Ok(())
}
