//! Negation scope detection around a concept match.
//!
//! Looks back a fixed number of tokens from the start of a match, staying in
//! the same clause and stopping at scope breakers, for a negation cue. A
//! shorter forward window catches post-positional cues ("kernig negative"),
//! and a form-style answer right after a colon ("fever: no") negates too.

use std::collections::HashSet;

use super::normalize::{phrase_tokens, NormalizedText};
use super::types::NegationSettings;

/// Compiled negation settings.
#[derive(Debug, Clone)]
pub struct NegationRules {
    cues: Vec<Vec<String>>,
    post_cues: Vec<Vec<String>>,
    colon_cues: Vec<Vec<String>>,
    breakers: HashSet<String>,
    window: usize,
    post_window: usize,
}

impl NegationRules {
    pub fn compile(settings: &NegationSettings) -> Self {
        let tokenize = |list: &[String]| -> Vec<Vec<String>> {
            list.iter()
                .map(|c| phrase_tokens(c))
                .filter(|t| !t.is_empty())
                .collect()
        };
        Self {
            cues: tokenize(&settings.cues),
            post_cues: tokenize(&settings.post_cues),
            colon_cues: tokenize(&settings.colon_cues),
            breakers: settings
                .scope_breakers
                .iter()
                .flat_map(|b| phrase_tokens(b))
                .collect(),
            window: settings.window,
            post_window: settings.post_window,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Is the match covering tokens `start..end` negated?
    pub fn is_negated(
        &self,
        text: &NormalizedText,
        start: usize,
        end: usize,
        extra_cues: &[Vec<String>],
    ) -> bool {
        let Some(anchor) = text.tokens.get(start) else {
            return false;
        };

        // Backward scope: contiguous tokens in the same clause, no breaker.
        let mut scope_start = start;
        while scope_start > 0 && start - scope_start < self.window {
            let prev = &text.tokens[scope_start - 1];
            if prev.clause != anchor.clause || self.breakers.contains(&prev.text) {
                break;
            }
            scope_start -= 1;
        }
        let before: Vec<&str> = text.tokens[scope_start..start]
            .iter()
            .map(|t| t.text.as_str())
            .collect();
        if self.cues.iter().chain(extra_cues).any(|cue| contains_seq(&before, cue)) {
            return true;
        }

        // Forward scope for post-positional cues.
        let Some(last) = end.checked_sub(1).and_then(|i| text.tokens.get(i)) else {
            return false;
        };
        if self.colon_answer_negates(text, last.end, end) {
            return true;
        }
        let mut scope_end = end;
        while scope_end < text.tokens.len() && scope_end - end < self.post_window {
            let next = &text.tokens[scope_end];
            if next.clause != last.clause || self.breakers.contains(&next.text) {
                break;
            }
            scope_end += 1;
        }
        let after: Vec<&str> = text.tokens[end..scope_end]
            .iter()
            .map(|t| t.text.as_str())
            .collect();
        self.post_cues.iter().any(|cue| contains_seq(&after, cue))
    }

    /// The match is followed by ":" and then a negative answer. The colon
    /// opens a new clause, so the post window never sees it.
    fn colon_answer_negates(&self, text: &NormalizedText, match_end: usize, next: usize) -> bool {
        let Some(following) = text.tokens.get(next) else {
            return false;
        };
        if text.text.get(match_end..following.start).map(str::trim) != Some(":") {
            return false;
        }
        let after: Vec<&str> = text.tokens[next..]
            .iter()
            .take_while(|t| t.clause == following.clause)
            .map(|t| t.text.as_str())
            .collect();
        self.colon_cues
            .iter()
            .any(|cue| after.len() >= cue.len() && after.iter().zip(cue).all(|(a, b)| *a == b))
    }
}

fn contains_seq(haystack: &[&str], needle: &[String]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack
        .windows(needle.len())
        .any(|w| w.iter().zip(needle).all(|(a, b)| *a == b))
}
