//! Age and sex extraction.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::Sex;
use crate::pipeline::vocabulary::normalize::fold;

use super::types::{best_of, Extraction};

fn compile(regex_str: &str) -> Regex {
    Regex::new(regex_str).expect("Invalid demographics regex pattern")
}

/// Oldest plausible age; anything above is a misread.
pub const MAX_AGE: u32 = 120;

// ═══════════════════════════════════════════════════════════
// Age
// ═══════════════════════════════════════════════════════════

struct AgePattern {
    regex: Regex,
    confidence: f32,
    /// Reject when a measurement unit follows the number.
    check_unit: bool,
}

static AGE_PATTERNS: LazyLock<Vec<AgePattern>> = LazyLock::new(|| {
    vec![
        // "28 years old", "28-year-old", "45 ans"
        AgePattern {
            regex: compile(r"\b(\d{1,3})\s*-?\s*(?:years?|yrs?|yo|y/o|ans|an)\b(\s*-?\s*old|\s*d'age)?"),
            confidence: 0.95,
            check_unit: false,
        },
        // "45a" as written in clinical notes
        AgePattern {
            regex: compile(r"\b(\d{1,3})a\b"),
            confidence: 0.90,
            check_unit: false,
        },
        // "aged 45", "age: 45", "agee de 45"
        AgePattern {
            regex: compile(r"\b(?:aged?|agee?)\s*(?:de|of|:)?\s*(\d{1,3})\b"),
            confidence: 0.95,
            check_unit: true,
        },
        // "female 28", "homme de 50"
        AgePattern {
            regex: compile(
                r"\b(?:female|male|woman|man|lady|girl|boy|femme|homme|fille|garcon|patient|patiente|mr|mrs|ms|mme)\s*,?\s*(?:of\s+|de\s+)?(\d{1,3})\b",
            ),
            confidence: 0.80,
            check_unit: true,
        },
        // "F28", "H 45" at the very start of a note
        AgePattern {
            regex: compile(r"^(?:f|h|m)\s*(\d{1,3})\b"),
            confidence: 0.80,
            check_unit: true,
        },
    ]
});

/// Duration context right before a number: "for 3 years", "depuis 2 ans".
static DURATION_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?:\bfor|\bsince|\bdepuis|\bpendant|\bover|\bpast|\blast|\bil y a|\bca fait|\bin)\s*$")
});

static AGO_SUFFIX: LazyLock<Regex> = LazyLock::new(|| compile(r"^\s*ago\b"));

static UNIT_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"^\s*(?:/\s*10|%|°|(?:weeks?|wks?|w|days?|d|hours?|hrs?|h|minutes?|mins?|min|mn|months?|mois|semaines?|sem|sa|jours?|j|heures?|kg|cm|mm|times|fois)\b)",
    )
});

/// Does a measurement unit follow byte offset `end`?
pub(crate) fn followed_by_unit(folded: &str, end: usize) -> bool {
    UNIT_SUFFIX.is_match(&folded[end..])
}

/// Extract the patient's age in years.
pub fn extract_age(text: &str) -> Option<Extraction<u8>> {
    let folded = fold(text);
    let mut hits = Vec::new();

    for pattern in AGE_PATTERNS.iter() {
        for caps in pattern.regex.captures_iter(&folded) {
            let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if DURATION_PREFIX.is_match(&folded[..whole.start()]) || AGO_SUFFIX.is_match(&folded[whole.end()..]) {
                continue;
            }
            if pattern.check_unit && followed_by_unit(&folded, number.end()) {
                continue;
            }
            let Ok(age) = number.as_str().parse::<u32>() else {
                continue;
            };
            if age > MAX_AGE {
                continue;
            }
            hits.push(Extraction::at(age as u8, pattern.confidence, &folded, whole.start(), whole.end()));
        }
    }

    best_of(hits)
}

// ═══════════════════════════════════════════════════════════
// Sex
// ═══════════════════════════════════════════════════════════

struct SexPattern {
    regex: Regex,
    sex: Sex,
    confidence: f32,
}

static SEX_PATTERNS: LazyLock<Vec<SexPattern>> = LazyLock::new(|| {
    let p = |regex_str: &str, sex: Sex, confidence: f32| SexPattern {
        regex: compile(regex_str),
        sex,
        confidence,
    };
    vec![
        p(
            r"\b(?:female|woman|women|girl|lady|mrs|ms|madame|mme|femme|fille|patiente)\b",
            Sex::Female,
            0.95,
        ),
        p(r"\b(?:male|man|boy|gentleman|mr|monsieur|homme|garcon)\b", Sex::Male, 0.95),
        p(
            r"\b(?:non-binary|nonbinary|non binaire|intersex|sex unspecified|sexe non precise)\b",
            Sex::Unspecified,
            0.90,
        ),
        p(
            r"\b(?:pregnant|pregnancy|enceinte|grossesse|postpartum|post-partum|gravida|g\dp\d|\d+\s*sa)\b",
            Sex::Female,
            0.90,
        ),
        p(r"^f\s*\d", Sex::Female, 0.85),
        p(r"^(?:h|m)\s*\d", Sex::Male, 0.85),
        p(r"\b(?:she|her|hers|herself|elle)\b", Sex::Female, 0.80),
        p(r"\b(?:he|him|his|himself)\b", Sex::Male, 0.80),
    ]
});

/// Extract the patient's sex.
///
/// When the strongest female and male cues are equally strong the text is
/// ambiguous and nothing is returned; the dialogue can ask instead.
pub fn extract_sex(text: &str) -> Option<Extraction<Sex>> {
    let folded = fold(text);
    let mut hits: Vec<Extraction<Sex>> = Vec::new();

    for pattern in SEX_PATTERNS.iter() {
        if let Some(m) = pattern.regex.find(&folded) {
            hits.push(Extraction::at(pattern.sex, pattern.confidence, &folded, m.start(), m.end()));
        }
    }

    let best = best_of(hits.clone())?;
    let contradicted = hits
        .iter()
        .any(|h| h.value != best.value && h.confidence >= best.confidence);
    if contradicted {
        tracing::debug!("Conflicting sex cues of equal strength, leaving sex unknown");
        return None;
    }
    Some(best)
}
