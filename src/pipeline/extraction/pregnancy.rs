//! Pregnancy trimester from explicit mentions or gestational age.

use std::sync::LazyLock;

use regex::Regex;

use crate::pipeline::vocabulary::normalize::fold;

use super::types::{best_of, Extraction};

fn compile(regex_str: &str) -> Regex {
    Regex::new(regex_str).expect("Invalid pregnancy regex pattern")
}

/// Full term plus a margin; anything above is not a gestational age.
pub const MAX_GESTATION_WEEKS: f64 = 42.0;

const WEEKS_PER_MONTH: f64 = 4.33;

const PREGNANCY_CUE: &str = r"(?:pregnant|pregnancy|enceinte|grossesse|gestation|gestational|amenorrhee)";

/// Trimester of a gestational age in weeks.
pub fn trimester_from_weeks(weeks: f64) -> Option<u8> {
    if !(0.0..=MAX_GESTATION_WEEKS).contains(&weeks) {
        return None;
    }
    Some(if weeks < 14.0 {
        1
    } else if weeks < 28.0 {
        2
    } else {
        3
    })
}

fn ordinal(raw: &str) -> Option<u8> {
    match raw {
        "first" | "1st" | "premier" | "1er" | "1" => Some(1),
        "second" | "2nd" | "deuxieme" | "2e" | "2eme" | "2" => Some(2),
        "third" | "3rd" | "troisieme" | "3e" | "3eme" | "3" => Some(3),
        _ => None,
    }
}

static EXPLICIT_TRIMESTER: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // "first trimester", "3e trimestre"
        compile(r"\b(first|1st|second|2nd|third|3rd|premier|1er|deuxieme|2e|2eme|troisieme|3e|3eme)\s+(?:trimester|trimestre)\b"),
        // "trimester 2", "trimestre 1"
        compile(r"\b(?:trimester|trimestre)\s*([123])\b"),
    ]
});

/// "T2" is only a trimester when pregnancy is mentioned somewhere.
static SHORT_TRIMESTER: LazyLock<Regex> = LazyLock::new(|| compile(r"\bt([123])\b"));

static PREGNANCY_WORD: LazyLock<Regex> = LazyLock::new(|| compile(&format!(r"\b{PREGNANCY_CUE}\b")));

static WEEKS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // "pregnant 8 weeks", "enceinte de 12 semaines", "pregnant at 20 weeks"
        compile(&format!(
            r"\b{PREGNANCY_CUE}\s*(?:of|de|at|a|for|since|depuis)?\s*(\d{{1,2}})\s*(?:weeks?|wks?|semaines?|sem)\b"
        )),
        // "8 weeks pregnant", "12 semaines de grossesse"
        compile(&format!(
            r"\b(\d{{1,2}})\s*(?:weeks?|wks?|semaines?|sem)\s*(?:of\s+|de\s+|d')?{PREGNANCY_CUE}"
        )),
        // "24 SA", "24 semaines d'amenorrhee"
        compile(r"\b(\d{1,2})\s*sa\b"),
    ]
});

static MONTHS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"\b(?:{PREGNANCY_CUE}\s*(?:of|de|since|depuis)?\s*(\d)\s*(?:months?|mois)\b|(\d)\s*(?:months?|mois)\s*(?:of\s+|de\s+)?{PREGNANCY_CUE})"
    ))
});

/// Extract the pregnancy trimester (1–3).
///
/// Explicit trimester wording wins; otherwise a gestational age in weeks
/// or months next to a pregnancy cue is converted.
pub fn extract_trimester(text: &str) -> Option<Extraction<u8>> {
    let folded = fold(text);
    let mut hits = Vec::new();

    for regex in EXPLICIT_TRIMESTER.iter() {
        for caps in regex.captures_iter(&folded) {
            let (Some(whole), Some(n)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if let Some(t) = ordinal(n.as_str()) {
                hits.push(Extraction::at(t, 0.95, &folded, whole.start(), whole.end()));
            }
        }
    }

    if PREGNANCY_WORD.is_match(&folded) {
        for caps in SHORT_TRIMESTER.captures_iter(&folded) {
            let (Some(whole), Some(n)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if let Some(t) = ordinal(n.as_str()) {
                hits.push(Extraction::at(t, 0.85, &folded, whole.start(), whole.end()));
            }
        }
    }

    for regex in WEEKS_PATTERNS.iter() {
        for caps in regex.captures_iter(&folded) {
            let (Some(whole), Some(n)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let Ok(weeks) = n.as_str().parse::<f64>() else {
                continue;
            };
            if let Some(t) = trimester_from_weeks(weeks) {
                hits.push(Extraction::at(t, 0.90, &folded, whole.start(), whole.end()));
            }
        }
    }

    for caps in MONTHS_PATTERN.captures_iter(&folded) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let Some(months) = caps
            .get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| m.as_str().parse::<f64>().ok())
        else {
            continue;
        };
        if let Some(t) = trimester_from_weeks(months * WEEKS_PER_MONTH) {
            hits.push(Extraction::at(t, 0.80, &folded, whole.start(), whole.end()));
        }
    }

    best_of(hits)
}
