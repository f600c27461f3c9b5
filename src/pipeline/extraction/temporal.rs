//! Onset, duration and temporal profile.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::models::{CaseField, FieldValue, Onset, Profile, MAX_DURATION_HOURS};
use crate::pipeline::vocabulary::normalize::{fold, normalize};
use crate::pipeline::vocabulary::Vocabulary;

use super::types::{best_of, Extraction};

/// Below one week the presentation is acute.
pub const ACUTE_MAX_HOURS: f64 = 7.0 * 24.0;
/// Up to ninety days it is subacute; beyond, chronic.
pub const SUBACUTE_MAX_HOURS: f64 = 90.0 * 24.0;

fn compile(regex_str: &str) -> Regex {
    Regex::new(regex_str).expect("Invalid temporal regex pattern")
}

const UNITS: &str = r"(minutes?|mins?|mn|hours?|hrs?|h|heures?|days?|jours?|j|weeks?|wks?|semaines?|sem|months?|mois|years?|ans?|annees?)";
const AMOUNT: &str = r"(\d+(?:[.,]\d+)?|an|a|one|two|three|un|une|deux|trois)";

struct DurationPattern {
    regex: Regex,
    confidence: f32,
    /// Bare numbers with a year unit are usually ages.
    allow_years: bool,
}

static DURATION_PATTERNS: LazyLock<Vec<DurationPattern>> = LazyLock::new(|| {
    vec![
        // "since 2 hours", "for 3 days", "depuis 48h", "il y a 2 jours"
        DurationPattern {
            regex: compile(&format!(
                r"\b(?:since|for|over the (?:last|past)|depuis|pendant|il y a|ca fait|voila)\s+(?:about\s+|around\s+|almost\s+|more than\s+|environ\s+|presque\s+|plus de\s+)?{AMOUNT}\s*{UNITS}\b"
            )),
            confidence: 0.90,
            allow_years: true,
        },
        // "2 days ago"
        DurationPattern {
            regex: compile(&format!(r"\b{AMOUNT}\s*{UNITS}\s+ago\b")),
            confidence: 0.85,
            allow_years: true,
        },
        // bare "2 hours", "48h"
        DurationPattern {
            regex: compile(&format!(r"\b(\d+(?:[.,]\d+)?)\s*{UNITS}\b")),
            confidence: 0.70,
            allow_years: false,
        },
    ]
});

/// Pregnancy wording in the same clause means the number is a gestational age.
static PREGNANCY_CONTEXT: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\b(?:pregnant|pregnancy|enceinte|grossesse|gestation|gestational)\b")
});

static PREGNANCY_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^\s*(?:of\s+)?(?:pregnant|pregnancy|gestation|de grossesse|d'amenorrhee|enceinte)\b")
});

/// A bare "at 10h" is a time of day.
static CLOCK_PREFIX: LazyLock<Regex> = LazyLock::new(|| compile(r"\b(?:at|a|vers|around)\s*$"));

fn parse_amount(raw: &str) -> Option<f64> {
    match raw {
        "a" | "an" | "one" | "un" | "une" => Some(1.0),
        "two" | "deux" => Some(2.0),
        "three" | "trois" => Some(3.0),
        _ => raw.replace(',', ".").parse::<f64>().ok(),
    }
}

/// Hours per unit, `None` for years when years are not allowed.
fn unit_hours(unit: &str, allow_years: bool) -> Option<f64> {
    let hours = match unit {
        u if u.starts_with("min") || u == "mn" => 1.0 / 60.0,
        u if u.starts_with("h") => 1.0,
        u if u.starts_with("d") || u.starts_with("jour") || u == "j" => 24.0,
        u if u.starts_with("w") || u.starts_with("sem") => 168.0,
        u if u.starts_with("month") || u == "mois" => 730.0,
        u if u.starts_with("y") || u.starts_with("an") => {
            if !allow_years {
                return None;
            }
            8760.0
        }
        _ => return None,
    };
    Some(hours)
}

/// Start of the clause containing byte offset `pos`.
fn clause_start(folded: &str, pos: usize) -> usize {
    folded[..pos]
        .rfind([',', ';', '.', '\n', '(', ':'])
        .map(|i| i + 1)
        .unwrap_or(0)
}

fn in_pregnancy_context(folded: &str, caps: &Captures<'_>) -> bool {
    let Some(whole) = caps.get(0) else {
        return false;
    };
    let clause = &folded[clause_start(folded, whole.start())..whole.start()];
    PREGNANCY_CONTEXT.is_match(clause) || PREGNANCY_SUFFIX.is_match(&folded[whole.end()..])
}

/// Extract how long the headache has lasted, in hours.
///
/// Gestational ages ("pregnant 8 weeks", "24 SA") are skipped so that a
/// pregnancy statement never becomes a headache duration.
pub fn extract_duration_hours(text: &str) -> Option<Extraction<f64>> {
    let folded = fold(text);
    let mut hits = Vec::new();

    for pattern in DURATION_PATTERNS.iter() {
        for caps in pattern.regex.captures_iter(&folded) {
            let (Some(whole), Some(amount), Some(unit)) = (caps.get(0), caps.get(1), caps.get(2)) else {
                continue;
            };
            if in_pregnancy_context(&folded, &caps) {
                continue;
            }
            if !pattern.allow_years && CLOCK_PREFIX.is_match(&folded[..whole.start()]) {
                continue;
            }
            let (Some(n), Some(per_unit)) = (parse_amount(amount.as_str()), unit_hours(unit.as_str(), pattern.allow_years)) else {
                continue;
            };
            let hours = n * per_unit;
            if hours <= 0.0 || hours > MAX_DURATION_HOURS {
                continue;
            }
            hits.push(Extraction::at(hours, pattern.confidence, &folded, whole.start(), whole.end()));
        }
    }

    best_of(hits)
}

/// Map a duration onto a temporal profile.
pub fn classify_duration(hours: f64) -> Profile {
    if hours < ACUTE_MAX_HOURS {
        Profile::Acute
    } else if hours <= SUBACUTE_MAX_HOURS {
        Profile::Subacute
    } else {
        Profile::Chronic
    }
}

/// Profile implied by an onset when nothing else is known.
pub fn profile_from_onset(onset: Onset) -> Profile {
    match onset {
        Onset::Thunderclap => Profile::Acute,
        Onset::Progressive => Profile::Subacute,
        Onset::Chronic => Profile::Chronic,
    }
}

/// Extract the onset mode from vocabulary concepts. Negated onsets
/// ("not sudden") say nothing about the actual onset and are ignored.
pub fn extract_onset(vocabulary: &Vocabulary, text: &str) -> Option<Extraction<Onset>> {
    let normalized = normalize(text);
    let detection = vocabulary.detect_field(&normalized, CaseField::Onset)?;
    if detection.negated {
        return None;
    }
    let onset = match &detection.value {
        FieldValue::Text(value) => value.parse::<Onset>().ok()?,
        _ => return None,
    };
    Some(Extraction {
        value: onset,
        confidence: detection.confidence,
        span: detection.span,
        matched_text: detection.matched_text,
    })
}

/// What a profile extraction was based on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileBasis {
    Duration,
    Lexical,
    /// Derived from the onset mode; weaker than anything stated.
    Onset,
}

/// Extract the temporal profile.
///
/// An explicit duration decides. Without one, lexical profile cues
/// ("for months", "depuis ce matin") are used, then the onset mode.
pub fn extract_profile(vocabulary: &Vocabulary, text: &str) -> Option<Extraction<Profile>> {
    extract_profile_with_basis(vocabulary, text).map(|(profile, _)| profile)
}

/// Same as [`extract_profile`], also reporting which cue decided.
pub fn extract_profile_with_basis(
    vocabulary: &Vocabulary,
    text: &str,
) -> Option<(Extraction<Profile>, ProfileBasis)> {
    if let Some(duration) = extract_duration_hours(text) {
        return Some((duration.map(classify_duration), ProfileBasis::Duration));
    }

    let normalized = normalize(text);
    if let Some(detection) = vocabulary.detect_field(&normalized, CaseField::Profile) {
        if !detection.negated {
            if let Some(profile) = detection.value.as_text().and_then(|v| v.parse::<Profile>().ok()) {
                let extraction = Extraction {
                    value: profile,
                    confidence: detection.confidence,
                    span: detection.span,
                    matched_text: detection.matched_text,
                };
                return Some((extraction, ProfileBasis::Lexical));
            }
        }
    }

    let onset = extract_onset(vocabulary, text)?;
    let confidence = onset.confidence * 0.9;
    Some((
        onset.map(profile_from_onset).with_confidence(confidence),
        ProfileBasis::Onset,
    ))
}
