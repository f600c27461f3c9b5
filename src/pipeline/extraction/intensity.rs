//! Pain intensity on the 0–10 numeric scale.

use std::sync::LazyLock;

use regex::Regex;

use crate::pipeline::vocabulary::normalize::fold;

use super::demographics::followed_by_unit;
use super::types::{best_of, Extraction};

pub const MAX_INTENSITY: u32 = 10;

fn compile(regex_str: &str) -> Regex {
    Regex::new(regex_str).expect("Invalid intensity regex pattern")
}

struct ScalePattern {
    regex: Regex,
    confidence: f32,
    check_unit: bool,
}

static SCALE_PATTERNS: LazyLock<Vec<ScalePattern>> = LazyLock::new(|| {
    vec![
        // "8/10", "7 / 10"
        ScalePattern {
            regex: compile(r"\b(\d{1,2})(?:[.,]5)?\s*/\s*10\b"),
            confidence: 0.95,
            check_unit: false,
        },
        // "7 out of 10", "6 sur 10"
        ScalePattern {
            regex: compile(r"\b(\d{1,2})\s*(?:out of|sur)\s*10\b"),
            confidence: 0.95,
            check_unit: false,
        },
        // "EVA 7", "pain score: 6", "intensity 9"
        ScalePattern {
            regex: compile(
                r"\b(?:eva|evn|ens|vas|nrs|pain score|pain|intensity|intensite|douleur|score)\s*(?:score|scale|level|rating|cotee|notee)?\s*(?:=|:|of|at|a|de|is|est de)?\s*(\d{1,2})\b",
            ),
            confidence: 0.85,
            check_unit: true,
        },
    ]
});

static QUALITATIVE: LazyLock<Vec<(Regex, u8)>> = LazyLock::new(|| {
    vec![
        (compile(r"\b(?:excruciating|unbearable|insupportable|atroce|intolerable)\b"), 9),
        (compile(r"\b(?:severe|very strong|very bad|intense|violent|violente|tres forte|tres intense)\b"), 8),
        (compile(r"\b(?:moderate|moderee|modere|moyenne)\b"), 5),
        (compile(r"\b(?:mild|slight|light|legere|leger|faible)\b"), 3),
    ]
});

/// Confidence of a word-only intensity ("severe"): below the fallback
/// threshold on purpose, it is a rough estimate.
const QUALITATIVE_CONFIDENCE: f32 = 0.60;

/// Extract pain intensity. Scores above 10 are misreads and rejected.
pub fn extract_intensity(text: &str) -> Option<Extraction<u8>> {
    let folded = fold(text);
    let mut hits = Vec::new();

    for pattern in SCALE_PATTERNS.iter() {
        for caps in pattern.regex.captures_iter(&folded) {
            let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if pattern.check_unit && followed_by_unit(&folded, number.end()) {
                continue;
            }
            let Ok(score) = number.as_str().parse::<u32>() else {
                continue;
            };
            if score > MAX_INTENSITY {
                continue;
            }
            hits.push(Extraction::at(score as u8, pattern.confidence, &folded, whole.start(), whole.end()));
        }
    }
    if let Some(best) = best_of(hits) {
        return Some(best);
    }

    QUALITATIVE.iter().find_map(|(regex, score)| {
        regex
            .find(&folded)
            .map(|m| Extraction::at(*score, QUALITATIVE_CONFIDENCE, &folded, m.start(), m.end()))
    })
}

/// A bare number reply ("7", "7/10") to an intensity question.
pub fn parse_intensity_answer(reply: &str) -> Option<u8> {
    static BARE: LazyLock<Regex> =
        LazyLock::new(|| compile(r"^\s*(\d{1,2})\s*(?:/\s*10|sur 10|out of 10)?\s*[.!]?\s*$"));
    let folded = fold(reply);
    let score: u32 = BARE.captures(&folded)?.get(1)?.as_str().parse().ok()?;
    (score <= MAX_INTENSITY).then_some(score as u8)
}
