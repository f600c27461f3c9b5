//! Interpretation of replies to the question just asked.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{CaseField, FieldKind, FieldValue, Onset, VisualDisturbance};
use crate::pipeline::extraction::{parse_intensity_answer, trimester_from_weeks};
use crate::pipeline::vocabulary::normalize::{fold, normalize};

/// Replies up to this many tokens count as short answers.
pub const DEFAULT_SHORT_ANSWER_TOKENS: usize = 4;

fn compile(regex_str: &str) -> Regex {
    Regex::new(regex_str).expect("Invalid answer regex pattern")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YesNo {
    Yes,
    No,
    Unsure,
}

/// How a reply relates to the field it answers.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    /// The reply gives the field a value.
    Value(FieldValue),
    /// The reply answers, but leaves the field unknown.
    Unknown,
    /// Not a direct answer; the text goes through extraction.
    Unrecognized,
}

const YES: &[&str] = &[
    "yes", "y", "yeah", "yep", "yup", "sure", "absolutely", "definitely", "indeed", "correct", "affirmative",
    "oui", "ouais", "o", "exactement", "absolument", "effectivement", "certainement",
];

const NO: &[&str] = &["no", "n", "nope", "nah", "never", "none", "negative", "non", "nan", "jamais", "aucun", "aucune", "pas"];

const NO_PHRASES: &[&[&str]] = &[&["not", "at", "all"], &["not", "really"], &["du", "tout"]];

const UNSURE_PHRASES: &[&[&str]] = &[
    &["don", "t", "know"],
    &["dont", "know"],
    &["do", "not", "know"],
    &["not", "sure"],
    &["unsure"],
    &["maybe"],
    &["perhaps"],
    &["unknown"],
    &["no", "idea"],
    &["not", "known"],
    &["sais", "pas"],
    &["peut", "etre"],
    &["pas", "sur"],
    &["aucune", "idee"],
    &["inconnu"],
];

/// Words that can surround a bare answer without adding anything to it.
const FILLER: &[&str] = &[
    "i", "am", "m", "je", "ne", "well", "um", "uh", "oh", "hmm", "ok", "okay", "thanks", "thank", "you", "please",
    "really", "of", "course", "doctor", "merci", "bien", "sur", "docteur",
];

/// Units and ordinals of scale and trimester answers ("7/10", "24 weeks").
const ANSWER_UNITS: &[&str] = &[
    "weeks", "week", "wk", "wks", "semaines", "semaine", "sem", "sa", "months", "month", "mois",
    "trimester", "trimestre", "first", "second", "third", "1st", "2nd", "3rd", "premier", "1er",
    "deuxieme", "2e", "2eme", "troisieme", "3e", "3eme", "t1", "t2", "t3",
];

fn is_answer_word(token: &str) -> bool {
    YES.contains(&token)
        || NO.contains(&token)
        || FILLER.contains(&token)
        || ANSWER_UNITS.contains(&token)
        || token.chars().all(|c| c.is_ascii_digit())
        || NO_PHRASES.iter().chain(UNSURE_PHRASES).any(|p| p.contains(&token))
}

fn contains_phrase(tokens: &[&str], phrase: &[&str]) -> bool {
    tokens.windows(phrase.len()).any(|w| w == phrase)
}

fn starts_with_phrase(tokens: &[&str], phrase: &[&str]) -> bool {
    tokens.len() >= phrase.len() && &tokens[..phrase.len()] == phrase
}

pub fn token_count(reply: &str) -> usize {
    normalize(reply).tokens.len()
}

pub fn is_short_reply(reply: &str, token_limit: usize) -> bool {
    let count = token_count(reply);
    count > 0 && count <= token_limit
}

/// A short reply made only of answer words: yes, no, "don't know", a
/// number or filler. Anything else in it ("no, stiff neck") is a finding
/// that extraction has to see.
pub fn is_bare_answer(reply: &str, token_limit: usize) -> bool {
    let normalized = normalize(reply);
    let count = normalized.tokens.len();
    count > 0 && count <= token_limit && normalized.tokens.iter().all(|t| is_answer_word(&t.text))
}

/// Yes, no or "don't know".
///
/// A bare answer is scanned whole, uncertainty first, then negatives, so
/// "well, no" reads as no. Any other reply only counts when it opens with
/// the answer ("yes, since yesterday", "pas de fievre").
pub fn interpret_yes_no(reply: &str, token_limit: usize) -> Option<YesNo> {
    let normalized = normalize(reply);
    let tokens: Vec<&str> = normalized.tokens.iter().map(|t| t.text.as_str()).collect();
    let first = *tokens.first()?;

    if is_bare_answer(reply, token_limit) {
        if UNSURE_PHRASES.iter().any(|p| contains_phrase(&tokens, p)) {
            return Some(YesNo::Unsure);
        }
        if tokens.iter().any(|t| NO.contains(t)) || NO_PHRASES.iter().any(|p| contains_phrase(&tokens, p)) {
            return Some(YesNo::No);
        }
        if tokens.iter().any(|t| YES.contains(t)) {
            return Some(YesNo::Yes);
        }
        return None;
    }

    if UNSURE_PHRASES.iter().any(|p| starts_with_phrase(&tokens, p)) {
        Some(YesNo::Unsure)
    } else if NO.contains(&first) || NO_PHRASES.iter().any(|p| starts_with_phrase(&tokens, p)) {
        Some(YesNo::No)
    } else if YES.contains(&first) {
        Some(YesNo::Yes)
    } else {
        None
    }
}

/// Trimester from a bare reply: "2", "second", "T3", "24 weeks".
pub fn parse_trimester_answer(reply: &str) -> Option<u8> {
    static ORDINAL: LazyLock<Regex> = LazyLock::new(|| {
        compile(r"^\s*(?:t|trimester|trimestre)?\s*(first|1st|premier|1er|1|second|2nd|deuxieme|2e|2eme|2|third|3rd|troisieme|3e|3eme|3)\s*(?:trimester|trimestre)?\s*[.!]?\s*$")
    });
    static WEEKS: LazyLock<Regex> =
        LazyLock::new(|| compile(r"^\s*(\d{1,2})\s*(?:weeks?|wks?|semaines?|sem|sa)\b"));
    static MONTHS: LazyLock<Regex> = LazyLock::new(|| compile(r"^\s*(\d)\s*(?:months?|mois)\b"));

    let folded = fold(reply);
    if let Some(caps) = ORDINAL.captures(&folded) {
        return match caps.get(1)?.as_str() {
            "first" | "1st" | "premier" | "1er" | "1" => Some(1),
            "second" | "2nd" | "deuxieme" | "2e" | "2eme" | "2" => Some(2),
            _ => Some(3),
        };
    }
    if let Some(caps) = WEEKS.captures(&folded) {
        let weeks: f64 = caps.get(1)?.as_str().parse().ok()?;
        return trimester_from_weeks(weeks);
    }
    let caps = MONTHS.captures(&folded)?;
    let months: f64 = caps.get(1)?.as_str().parse().ok()?;
    trimester_from_weeks(months * 4.33)
}

/// Read `reply` as the answer to `field`.
pub fn interpret_answer(field: CaseField, reply: &str, token_limit: usize) -> Interpretation {
    match field {
        CaseField::Intensity => match parse_intensity_answer(reply) {
            Some(score) => Interpretation::Value(FieldValue::Number(score as f64)),
            None => unsure_or_unrecognized(reply, token_limit),
        },
        CaseField::PregnancyTrimester => match parse_trimester_answer(reply) {
            Some(trimester) => Interpretation::Value(FieldValue::Number(trimester as f64)),
            None => unsure_or_unrecognized(reply, token_limit),
        },
        // A plain no means no visual symptoms; the kind comes from extraction.
        CaseField::VisualDisturbance => match interpret_yes_no(reply, token_limit) {
            Some(YesNo::No) => Interpretation::Value(FieldValue::Text(VisualDisturbance::Absent.as_str().to_string())),
            Some(YesNo::Unsure) => Interpretation::Unknown,
            Some(YesNo::Yes) | None => Interpretation::Unrecognized,
        },
        // "Did it start suddenly?" - no only rules out thunderclap.
        CaseField::Onset => match interpret_yes_no(reply, token_limit) {
            Some(YesNo::Yes) => Interpretation::Value(FieldValue::Text(Onset::Thunderclap.as_str().to_string())),
            Some(YesNo::No | YesNo::Unsure) => Interpretation::Unknown,
            None => Interpretation::Unrecognized,
        },
        _ if matches!(field.kind(), FieldKind::Boolean) => match interpret_yes_no(reply, token_limit) {
            Some(YesNo::Yes) => Interpretation::Value(FieldValue::Bool(true)),
            Some(YesNo::No) => Interpretation::Value(FieldValue::Bool(false)),
            Some(YesNo::Unsure) => Interpretation::Unknown,
            None => Interpretation::Unrecognized,
        },
        _ => unsure_or_unrecognized(reply, token_limit),
    }
}

fn unsure_or_unrecognized(reply: &str, token_limit: usize) -> Interpretation {
    match interpret_yes_no(reply, token_limit) {
        Some(YesNo::Unsure) => Interpretation::Unknown,
        _ => Interpretation::Unrecognized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = DEFAULT_SHORT_ANSWER_TOKENS;

    #[test]
    fn short_yes_and_no_in_both_languages() {
        for reply in ["yes", "Yes.", "oui", "ouais", "yep!", "oui bien sûr"] {
            assert_eq!(interpret_yes_no(reply, LIMIT), Some(YesNo::Yes), "{reply}");
        }
        for reply in ["no", "Non", "nope", "not at all", "pas du tout", "non merci"] {
            assert_eq!(interpret_yes_no(reply, LIMIT), Some(YesNo::No), "{reply}");
        }
    }

    #[test]
    fn leading_negative_answers() {
        assert_eq!(interpret_yes_no("pas de fièvre", LIMIT), Some(YesNo::No));
        assert_eq!(interpret_yes_no("no fever", LIMIT), Some(YesNo::No));
        assert_eq!(interpret_yes_no("well, no", LIMIT), Some(YesNo::No));
    }

    #[test]
    fn negative_word_inside_a_finding_is_not_an_answer() {
        assert_eq!(interpret_yes_no("stiff neck, no fever", LIMIT), None);
        assert_eq!(interpret_yes_no("vomiting, never before", LIMIT), None);
    }

    #[test]
    fn bare_answers_carry_nothing_else() {
        for reply in ["no", "yes please", "non merci", "I don't know", "pas du tout", "7", "8/10", "24 weeks", "T2"] {
            assert!(is_bare_answer(reply, LIMIT), "{reply}");
        }
        for reply in ["no, stiff neck", "no fever, seizure", "pas de fièvre", "since yesterday", ""] {
            assert!(!is_bare_answer(reply, LIMIT), "{reply}");
        }
        assert!(!is_bare_answer("no no no no no", LIMIT));
    }

    #[test]
    fn uncertainty_is_recognized() {
        for reply in ["I don't know", "not sure", "je sais pas", "no idea", "peut-être"] {
            assert_eq!(interpret_yes_no(reply, LIMIT), Some(YesNo::Unsure), "{reply}");
        }
    }

    #[test]
    fn long_reply_counts_only_with_leading_answer() {
        assert_eq!(
            interpret_yes_no("yes, and it started two days ago", LIMIT),
            Some(YesNo::Yes)
        );
        assert_eq!(interpret_yes_no("the pain started two days ago, no fever", LIMIT), None);
    }

    #[test]
    fn unrelated_short_reply_is_not_an_answer() {
        assert_eq!(interpret_yes_no("since yesterday", LIMIT), None);
        assert_eq!(interpret_yes_no("", LIMIT), None);
    }

    #[test]
    fn boolean_field_answers() {
        assert_eq!(
            interpret_answer(CaseField::Fever, "oui", LIMIT),
            Interpretation::Value(FieldValue::Bool(true))
        );
        assert_eq!(
            interpret_answer(CaseField::Seizure, "no", LIMIT),
            Interpretation::Value(FieldValue::Bool(false))
        );
        assert_eq!(interpret_answer(CaseField::Trauma, "not sure", LIMIT), Interpretation::Unknown);
    }

    #[test]
    fn onset_no_leaves_onset_unknown() {
        assert_eq!(
            interpret_answer(CaseField::Onset, "yes", LIMIT),
            Interpretation::Value(FieldValue::Text("thunderclap".into()))
        );
        assert_eq!(interpret_answer(CaseField::Onset, "no", LIMIT), Interpretation::Unknown);
    }

    #[test]
    fn intensity_answer_is_a_number() {
        assert_eq!(
            interpret_answer(CaseField::Intensity, "7", LIMIT),
            Interpretation::Value(FieldValue::Number(7.0))
        );
        assert_eq!(
            interpret_answer(CaseField::Intensity, "8/10", LIMIT),
            Interpretation::Value(FieldValue::Number(8.0))
        );
        assert_eq!(interpret_answer(CaseField::Intensity, "12", LIMIT), Interpretation::Unrecognized);
        assert_eq!(interpret_answer(CaseField::Intensity, "yes", LIMIT), Interpretation::Unrecognized);
    }

    #[test]
    fn trimester_answers() {
        assert_eq!(parse_trimester_answer("2"), Some(2));
        assert_eq!(parse_trimester_answer("third trimester"), Some(3));
        assert_eq!(parse_trimester_answer("T1"), Some(1));
        assert_eq!(parse_trimester_answer("24 weeks"), Some(2));
        assert_eq!(parse_trimester_answer("5 mois"), Some(2));
        assert_eq!(parse_trimester_answer("4"), None);
    }

    #[test]
    fn visual_answers() {
        assert_eq!(
            interpret_answer(CaseField::VisualDisturbance, "no", LIMIT),
            Interpretation::Value(FieldValue::Text("none".into()))
        );
        assert_eq!(interpret_answer(CaseField::VisualDisturbance, "not sure", LIMIT), Interpretation::Unknown);
        assert_eq!(interpret_answer(CaseField::VisualDisturbance, "yes", LIMIT), Interpretation::Unrecognized);
        assert_eq!(
            interpret_answer(CaseField::VisualDisturbance, "blurred vision", LIMIT),
            Interpretation::Unrecognized
        );
    }

    #[test]
    fn free_text_fields_go_to_extraction() {
        assert_eq!(interpret_answer(CaseField::Profile, "three days", LIMIT), Interpretation::Unrecognized);
        assert_eq!(interpret_answer(CaseField::Profile, "don't know", LIMIT), Interpretation::Unknown);
    }

    #[test]
    fn short_reply_limit() {
        assert!(is_short_reply("yes", LIMIT));
        assert!(is_short_reply("no not at all", LIMIT));
        assert!(!is_short_reply("no, but my neck is really stiff", LIMIT));
        assert!(!is_short_reply("   ", LIMIT));
    }
}
