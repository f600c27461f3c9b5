//! Approximate matching of known forms against input n-grams.
//!
//! Only used after exact and acronym matching found nothing. Short forms
//! are never matched approximately: one typo in a four-letter token is
//! usually a different word.

/// Compute Levenshtein edit distance between two strings.
pub fn edit_distance(a: &str, b: &str) -> u32 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 { return n as u32; }
    if n == 0 { return m as u32; }

    let mut prev: Vec<u32> = (0..=n as u32).collect();
    let mut curr = vec![0u32; n + 1];

    for (i, &a_ch) in a_chars.iter().enumerate() {
        curr[0] = (i + 1) as u32;
        for (j, &b_ch) in b_chars.iter().enumerate() {
            let cost = if a_ch == b_ch { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1)
                .min(curr[j] + 1)
                .min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Similarity in [0, 1]: 1 - distance / longer length.
pub fn similarity(a: &str, b: &str) -> f32 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - edit_distance(a, b) as f32 / longest as f32
}

/// Similarity if it reaches `floor`, skipping the distance computation when
/// the length gap alone already rules the pair out.
pub fn similarity_above(candidate: &str, form: &str, floor: f32) -> Option<f32> {
    let (lc, lf) = (candidate.chars().count(), form.chars().count());
    let longest = lc.max(lf);
    if longest == 0 {
        return None;
    }
    let gap = lc.abs_diff(lf) as f32 / longest as f32;
    if 1.0 - gap < floor {
        return None;
    }
    let score = similarity(candidate, form);
    (score >= floor).then_some(score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_distance_basic() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("abc", "abc"), 0);
        assert_eq!(edit_distance("meningismus", "meningismsu"), 2);
        assert_eq!(edit_distance("thunderclap", "thunderclp"), 1);
    }

    #[test]
    fn similarity_scales_with_length() {
        assert!((similarity("hemiparesis", "hemiparesis") - 1.0).abs() < f32::EPSILON);
        let one_typo = similarity("hemiparesis", "hemiparesys");
        assert!(one_typo > 0.9 && one_typo < 1.0, "got {one_typo}");
    }

    #[test]
    fn short_words_fall_below_high_floor() {
        // a single substitution in a five letter word is only 0.8
        assert!(similarity_above("fevar", "fever", 0.92).is_none());
    }

    #[test]
    fn length_gap_short_circuits() {
        assert!(similarity_above("seizure", "seizures and more", 0.9).is_none());
        assert!(similarity_above("thunderclpa", "thunderclap", 0.8).is_some());
    }
}
