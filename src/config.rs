use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dialogue::DEFAULT_QUESTION_BUDGET;
use crate::dialogue::answers::DEFAULT_SHORT_ANSWER_TOKENS;
use crate::pipeline::extraction::thresholds;
use crate::pipeline::nlu::fallback::{DEFAULT_FALLBACK_TIMEOUT, DEFAULT_MIN_SIMILARITY};
use crate::rules::AdaptationSettings;

/// Application-level constants
pub const APP_NAME: &str = "headache-triage";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const CONFIG_FILE: &str = "engine.json";

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "headache_triage=info"
}

/// Directory holding the optional configuration file.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME))
}

pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE))
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read configuration {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Malformed configuration {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Tunable engine parameters. Every field has a default, so a partial file
/// only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Aggregate extraction confidence below which the semantic fallback
    /// is consulted.
    pub fallback_threshold: f32,
    pub fallback_timeout_ms: u64,
    pub fallback_min_similarity: f32,
    /// Disable the semantic fallback entirely.
    pub fallback_enabled: bool,
    /// Similarity floor for approximate vocabulary matches. `None` keeps
    /// the vocabulary's own setting.
    pub fuzzy_floor: Option<f32>,
    pub question_budget: usize,
    pub short_answer_tokens: usize,
    pub renal_precaution_age: u8,
    pub pregnancy_test_age: u8,
    /// Override files; built-in resources are used when absent.
    pub vocabulary_path: Option<PathBuf>,
    pub rules_path: Option<PathBuf>,
    pub corpus_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let adaptation = AdaptationSettings::default();
        Self {
            fallback_threshold: thresholds::MODERATE,
            fallback_timeout_ms: DEFAULT_FALLBACK_TIMEOUT.as_millis() as u64,
            fallback_min_similarity: DEFAULT_MIN_SIMILARITY,
            fallback_enabled: true,
            fuzzy_floor: None,
            question_budget: DEFAULT_QUESTION_BUDGET,
            short_answer_tokens: DEFAULT_SHORT_ANSWER_TOKENS,
            renal_precaution_age: adaptation.renal_precaution_age,
            pregnancy_test_age: adaptation.pregnancy_test_age,
            vocabulary_path: None,
            rules_path: None,
            corpus_path: None,
        }
    }
}

impl EngineConfig {
    /// Load from the default location; a missing file means defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        tracing::info!(path = %path.display(), "Engine configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = |name: &str, value: f32| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} must be within [0, 1], got {value}")))
            }
        };
        unit("fallback_threshold", self.fallback_threshold)?;
        unit("fallback_min_similarity", self.fallback_min_similarity)?;
        if let Some(floor) = self.fuzzy_floor {
            if !(0.5..=1.0).contains(&floor) {
                return Err(ConfigError::Invalid(format!("fuzzy_floor must be within [0.5, 1], got {floor}")));
            }
        }
        if self.fallback_timeout_ms == 0 {
            return Err(ConfigError::Invalid("fallback_timeout_ms must be positive".into()));
        }
        if self.short_answer_tokens == 0 {
            return Err(ConfigError::Invalid("short_answer_tokens must be positive".into()));
        }
        if self.renal_precaution_age > 120 || self.pregnancy_test_age > 120 {
            return Err(ConfigError::Invalid("age thresholds must be within [0, 120]".into()));
        }
        Ok(())
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_millis(self.fallback_timeout_ms)
    }

    pub fn adaptation(&self) -> AdaptationSettings {
        AdaptationSettings {
            renal_precaution_age: self.renal_precaution_age,
            pregnancy_test_age: self.pregnancy_test_age,
        }
    }
}
