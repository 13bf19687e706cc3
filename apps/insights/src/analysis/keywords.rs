use std::collections::HashMap;

use crate::analysis::pos::{tag_words, PosTag};
use crate::analysis::stopwords::is_stop_word;
use crate::analysis::text::{sentences, tokens, Token};

/// Keywords ordered by descending frequency (ties keep first-seen order).
/// Tokens are lowercased; stop-words, tokens of 3 chars or fewer and tokens
/// containing digits are dropped.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let candidates = tokens(text).filter_map(|t| match t {
        Token::Word(w) => {
            let w = w.to_lowercase();
            let keep = w.chars().count() > 3
                && !w.chars().any(char::is_numeric)
                && !is_stop_word(&w);
            keep.then_some(w)
        }
        Token::Punct => None,
    });
    rank_by_frequency(candidates)
}

/// Multi-word noun phrases ordered by descending frequency.
///
/// Within each sentence, consecutive noun-tagged non-stop-word tokens form a
/// phrase; punctuation and any other tag end it. Single nouns are left to
/// `extract_keywords`.
pub fn extract_important_phrases(text: &str) -> Vec<String> {
    let mut phrases = Vec::new();

    for sentence in sentences(text) {
        // Punctuation splits a sentence into runs that are tagged independently.
        let mut run: Vec<&str> = Vec::new();
        let mut runs: Vec<Vec<&str>> = Vec::new();
        for token in tokens(sentence) {
            match token {
                Token::Word(w) => run.push(w),
                Token::Punct => runs.push(std::mem::take(&mut run)),
            }
        }
        runs.push(run);

        for (i, run) in runs.iter().enumerate() {
            let tags = tag_words(run, i == 0);
            let mut current: Vec<String> = Vec::new();
            for (word, tag) in run.iter().zip(tags) {
                if tag == PosTag::Noun && !is_stop_word(word) {
                    current.push(word.to_lowercase());
                } else {
                    flush_phrase(&mut current, &mut phrases);
                }
            }
            flush_phrase(&mut current, &mut phrases);
        }
    }

    rank_by_frequency(phrases.into_iter())
}

fn flush_phrase(current: &mut Vec<String>, phrases: &mut Vec<String>) {
    if current.len() >= 2 {
        phrases.push(current.join(" "));
    }
    current.clear();
}

fn rank_by_frequency(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (position, item) in items.enumerate() {
        counts.entry(item).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked.into_iter().map(|(item, _)| item).collect()
}
