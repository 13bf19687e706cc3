use std::collections::HashSet;

use crate::analysis::text::{sentences, syllables, words};
use crate::models::resume::Readability;

/// Words with this many syllables or more count as difficult.
const DIFFICULT_SYLLABLES: usize = 3;

/// Flesch reading ease and Flesch–Kincaid grade over local tokenization.
/// Empty input yields all-zero metrics.
pub fn compute_readability(text: &str) -> Readability {
    let words = words(text);
    let word_count = words.len();
    if word_count == 0 {
        return Readability::default();
    }
    let sentence_count = sentences(text).len();

    let letters: usize = words
        .iter()
        .map(|w| w.chars().filter(|c| c.is_alphanumeric()).count())
        .sum();
    let syllable_counts: Vec<usize> = words.iter().map(|w| syllables(w)).collect();
    let total_syllables: usize = syllable_counts.iter().sum();

    let difficult_words = words
        .iter()
        .zip(&syllable_counts)
        .filter(|(_, &s)| s >= DIFFICULT_SYLLABLES)
        .map(|(w, _)| w.to_lowercase())
        .collect::<HashSet<_>>()
        .len();

    let words_per_sentence = word_count as f64 / sentence_count.max(1) as f64;
    let syllables_per_word = total_syllables as f64 / word_count as f64;

    Readability {
        sentence_count,
        word_count,
        avg_sentence_length: round2(words_per_sentence),
        avg_word_length: round2(letters as f64 / word_count as f64),
        flesch_score: round2(206.835 - 1.015 * words_per_sentence - 84.6 * syllables_per_word),
        flesch_grade_level: round2(0.39 * words_per_sentence + 11.8 * syllables_per_word - 15.59),
        difficult_words,
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_all_zero() {
        assert_eq!(compute_readability(""), Readability::default());
        assert_eq!(compute_readability("  \n-- "), Readability::default());
    }

    #[test]
    fn test_counts_and_averages() {
        let r = compute_readability("The cat sat. The dog ran.");
        assert_eq!(r.sentence_count, 2);
        assert_eq!(r.word_count, 6);
        assert_eq!(r.avg_sentence_length, 3.0);
        assert_eq!(r.avg_word_length, 3.0);
        assert_eq!(r.difficult_words, 0);
        // 206.835 - 1.015*3 - 84.6*1
        assert_eq!(r.flesch_score, 119.19);
    }

    #[test]
    fn test_no_sentence_terminator_counts_one_sentence() {
        let r = compute_readability("Designed scalable infrastructure");
        assert_eq!(r.sentence_count, 1);
        assert_eq!(r.avg_sentence_length, 3.0);
    }

    #[test]
    fn test_difficult_words_are_distinct() {
        let r = compute_readability("Infrastructure automation. Infrastructure again.");
        // infrastructure (4), automation (4); "again" has 2
        assert_eq!(r.difficult_words, 2);
    }

    #[test]
    fn test_complex_text_scores_lower() {
        let simple = compute_readability("I like to code. I ship fast. I test it.");
        let dense = compute_readability(
            "Architected heterogeneous distributed infrastructure facilitating organizational interoperability across multidisciplinary engineering departments.",
        );
        assert!(simple.flesch_score > dense.flesch_score);
        assert!(simple.flesch_grade_level < dense.flesch_grade_level);
    }
}
