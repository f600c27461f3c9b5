//! Text normalization shared by the vocabulary matcher and the extractors.
//!
//! Lowercases, folds diacritics and unifies apostrophes so that "Fièvre",
//! "fievre" and "FIÈVRE" compare equal. Tokens carry byte offsets into the
//! normalized string plus the sentence and clause they belong to.

/// Fold a single character to its unaccented lowercase form.
/// Ligatures expand to two characters, so the result is a small string.
fn fold_char(c: char, out: &mut String) {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => out.push('a'),
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => out.push('e'),
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => out.push('i'),
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => out.push('o'),
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => out.push('u'),
        'ý' | 'ÿ' | 'Ý' => out.push('y'),
        'ç' | 'Ç' => out.push('c'),
        'ñ' | 'Ñ' => out.push('n'),
        'œ' | 'Œ' => out.push_str("oe"),
        'æ' | 'Æ' => out.push_str("ae"),
        '\u{2019}' | '\u{2018}' | '`' | '´' => out.push('\''),
        '\u{00A0}' | '\t' | '\r' => out.push(' '),
        _ => out.extend(c.to_lowercase()),
    }
}

/// Lowercase, fold diacritics and collapse runs of spaces.
/// Newlines are kept because they end sentences.
pub fn fold(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for c in text.chars() {
        fold_char(c, &mut folded);
    }

    let mut collapsed = String::with_capacity(folded.len());
    let mut last_space = false;
    for c in folded.trim().chars() {
        if c == ' ' {
            if !last_space {
                collapsed.push(c);
            }
            last_space = true;
        } else {
            collapsed.push(c);
            last_space = false;
        }
    }
    collapsed
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// Byte offset into the normalized text.
    pub start: usize,
    pub end: usize,
    pub sentence: usize,
    pub clause: usize,
}

/// A normalized input ready for matching.
#[derive(Debug, Clone)]
pub struct NormalizedText {
    pub text: String,
    pub tokens: Vec<Token>,
}

impl NormalizedText {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Normalized text covered by tokens `start..end` (end exclusive).
    pub fn slice(&self, start: usize, end: usize) -> &str {
        match (self.tokens.get(start), end.checked_sub(1).and_then(|e| self.tokens.get(e))) {
            (Some(first), Some(last)) => &self.text[first.start..last.end],
            _ => "",
        }
    }

    /// Find every occurrence of `phrase` (already tokenized) that lies
    /// within a single sentence. Returns token ranges.
    pub fn find_phrase(&self, phrase: &[String]) -> Vec<(usize, usize)> {
        let n = phrase.len();
        if n == 0 || n > self.tokens.len() {
            return Vec::new();
        }
        (0..=self.tokens.len() - n)
            .filter(|&i| {
                let window = &self.tokens[i..i + n];
                window[0].sentence == window[n - 1].sentence
                    && window.iter().zip(phrase).all(|(t, p)| t.text == *p)
            })
            .map(|i| (i, i + n))
            .collect()
    }

    /// True if `phrase` occurs anywhere in sentence `sentence`.
    pub fn sentence_contains(&self, sentence: usize, phrase: &[String]) -> bool {
        self.find_phrase(phrase)
            .iter()
            .any(|(s, _)| self.tokens[*s].sentence == sentence)
    }
}

fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || c == '+'
}

/// Normalize and tokenize free text.
pub fn normalize(text: &str) -> NormalizedText {
    let folded = fold(text);
    let mut tokens = Vec::new();
    let mut sentence = 0usize;
    let mut clause = 0usize;
    let mut current: Option<usize> = None;

    let chars: Vec<(usize, char)> = folded.char_indices().collect();
    for (idx, &(pos, c)) in chars.iter().enumerate() {
        if is_token_char(c) {
            if current.is_none() {
                current = Some(pos);
            }
            continue;
        }

        if let Some(start) = current.take() {
            tokens.push(Token {
                text: folded[start..pos].to_string(),
                start,
                end: pos,
                sentence,
                clause,
            });
        }

        let next_is_digit = chars
            .get(idx + 1)
            .map(|(_, n)| n.is_ascii_digit())
            .unwrap_or(false);
        match c {
            // "38.5" is a number, not a sentence end
            '.' if next_is_digit => {}
            '.' | '!' | '?' | ';' | '\n' => {
                sentence += 1;
                clause += 1;
            }
            ',' | ':' | '(' | ')' => clause += 1,
            _ => {}
        }
    }
    if let Some(start) = current {
        tokens.push(Token {
            text: folded[start..].to_string(),
            start,
            end: folded.len(),
            sentence,
            clause,
        });
    }

    NormalizedText {
        text: folded,
        tokens,
    }
}

/// Tokenize a configured phrase the same way input text is tokenized.
pub fn phrase_tokens(phrase: &str) -> Vec<String> {
    normalize(phrase).tokens.into_iter().map(|t| t.text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_strips_accents_and_case() {
        assert_eq!(fold("Fièvre à 39°C"), "fievre a 39°c");
        assert_eq!(fold("ŒDÈME papillaire"), "oedeme papillaire");
        assert_eq!(fold("  Raideur   de  nuque "), "raideur de nuque");
    }

    #[test]
    fn fold_unifies_apostrophes() {
        assert_eq!(fold("d\u{2019}un coup"), "d'un coup");
    }

    #[test]
    fn tokens_split_on_punctuation() {
        let nt = normalize("Post-partum, 8/10.");
        let words: Vec<&str> = nt.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(words, vec!["post", "partum", "8", "10"]);
    }

    #[test]
    fn plus_sign_stays_in_token() {
        let nt = normalize("RDN+ ce matin");
        assert_eq!(nt.tokens[0].text, "rdn+");
    }

    #[test]
    fn sentences_and_clauses_are_numbered() {
        let nt = normalize("no fever, neck stiffness. Seizure yesterday");
        assert_eq!(nt.tokens[0].clause, nt.tokens[1].clause);
        assert_ne!(nt.tokens[1].clause, nt.tokens[2].clause, "comma starts a clause");
        assert_eq!(nt.tokens[2].sentence, 0);
        assert_eq!(nt.tokens[4].sentence, 1);
    }

    #[test]
    fn decimal_point_does_not_end_sentence() {
        let nt = normalize("temperature 38.5 today");
        assert!(nt.tokens.iter().all(|t| t.sentence == 0));
    }

    #[test]
    fn find_phrase_respects_sentence_boundaries() {
        let nt = normalize("the neck. stiffness came later");
        let phrase = phrase_tokens("neck stiffness");
        assert!(nt.find_phrase(&phrase).is_empty());

        let nt = normalize("obvious neck stiffness");
        assert_eq!(nt.find_phrase(&phrase), vec![(1, 3)]);
        assert_eq!(nt.slice(1, 3), "neck stiffness");
    }
}
