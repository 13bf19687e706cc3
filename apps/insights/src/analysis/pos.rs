//! Lexicon + suffix part-of-speech tagger.
//!
//! Closed word classes come from fixed lists; open classes are guessed from
//! suffixes, with capitalised words inside a sentence treated as proper nouns.
//! Only the noun/non-noun split matters to phrase extraction.

use std::collections::HashSet;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosTag {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Determiner,
    Preposition,
    Pronoun,
    Conjunction,
    Number,
}

fn set(words: &'static [&'static str]) -> HashSet<&'static str> {
    words.iter().copied().collect()
}

static DETERMINERS: LazyLock<HashSet<&str>> = LazyLock::new(|| {
    set(&[
        "a", "an", "the", "this", "that", "these", "those", "each", "every", "some", "any", "all",
        "no", "both", "either", "neither", "several", "many", "few", "much", "another",
    ])
});

static PREPOSITIONS: LazyLock<HashSet<&str>> = LazyLock::new(|| {
    set(&[
        "in", "on", "at", "by", "for", "with", "about", "against", "between", "into", "through",
        "during", "before", "after", "above", "below", "to", "from", "up", "down", "of", "off",
        "over", "under", "across", "within", "without", "via", "per", "toward", "towards", "among",
    ])
});

static PRONOUNS: LazyLock<HashSet<&str>> = LazyLock::new(|| {
    set(&[
        "i", "me", "my", "mine", "we", "us", "our", "ours", "you", "your", "yours", "he", "him",
        "his", "she", "her", "hers", "it", "its", "they", "them", "their", "theirs", "who",
        "whom", "whose", "which", "what", "myself", "ourselves",
    ])
});

static CONJUNCTIONS: LazyLock<HashSet<&str>> = LazyLock::new(|| {
    set(&[
        "and", "or", "but", "nor", "so", "yet", "because", "although", "while", "if", "unless",
        "since", "whereas", "as", "than",
    ])
});

static VERBS: LazyLock<HashSet<&str>> = LazyLock::new(|| {
    set(&[
        "is", "are", "was", "were", "be", "been", "being", "am", "have", "has", "had", "do",
        "does", "did", "will", "would", "can", "could", "should", "may", "might", "must", "shall",
        "led", "built", "ran", "made", "drove", "grew", "won", "wrote", "taught", "own", "lead",
        "build", "run", "make", "drive", "manage", "develop", "design", "create", "deliver",
        "improve", "reduce", "increase", "implement", "maintain", "support", "use", "get",
    ])
});

const ADJECTIVE_SUFFIXES: &[&str] = &[
    "ous", "ful", "ive", "able", "ible", "al", "ic", "less", "ish", "ary",
];

/// Words with adjective-looking suffixes that are nouns in resumes.
static NOUN_EXCEPTIONS: LazyLock<HashSet<&str>> = LazyLock::new(|| {
    set(&[
        "terminal", "portal", "proposal", "approval", "rental", "arrival", "professional",
        "analytics", "logic", "graphic", "graphics", "metric", "topic", "objective", "executive",
        "initiative", "library", "summary", "salary", "dictionary", "secretary", "clinic",
        "mechanic", "individual", "manual", "journal", "signal", "capital", "tutorial",
    ])
});

/// Tags one token. `sentence_start` disables the capitalisation heuristic.
pub fn tag_word(word: &str, sentence_start: bool) -> PosTag {
    let lower = word.to_lowercase();
    let w = lower.as_str();

    if w.chars().next().is_some_and(char::is_numeric) {
        return PosTag::Number;
    }
    if DETERMINERS.contains(w) {
        return PosTag::Determiner;
    }
    if PRONOUNS.contains(w) {
        return PosTag::Pronoun;
    }
    if PREPOSITIONS.contains(w) {
        return PosTag::Preposition;
    }
    if CONJUNCTIONS.contains(w) {
        return PosTag::Conjunction;
    }
    if VERBS.contains(w) {
        return PosTag::Verb;
    }

    let capitalised = word.chars().next().is_some_and(char::is_uppercase);
    if capitalised && !sentence_start {
        return PosTag::Noun;
    }
    if NOUN_EXCEPTIONS.contains(w) {
        return PosTag::Noun;
    }
    if w.len() > 4 && w.ends_with("ly") {
        return PosTag::Adverb;
    }
    if w.len() > 4 && w.ends_with("ed") {
        return PosTag::Verb;
    }
    if w.len() > 4 && w.ends_with("ing") {
        return PosTag::Verb;
    }
    if w.len() > 4 && ADJECTIVE_SUFFIXES.iter().any(|s| w.ends_with(s)) {
        return PosTag::Adjective;
    }
    PosTag::Noun
}

/// Tags a run of consecutive words. A gerund directly after a noun or
/// adjective (`machine learning`, `distributed computing`) is read as a noun.
pub fn tag_words(words: &[&str], starts_sentence: bool) -> Vec<PosTag> {
    let mut tags: Vec<PosTag> = Vec::with_capacity(words.len());
    for (i, word) in words.iter().enumerate() {
        let mut tag = tag_word(word, starts_sentence && i == 0);
        if tag == PosTag::Verb
            && word.to_lowercase().ends_with("ing")
            && matches!(tags.last(), Some(PosTag::Noun | PosTag::Adjective))
        {
            tag = PosTag::Noun;
        }
        tags.push(tag);
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_classes() {
        assert_eq!(tag_word("the", false), PosTag::Determiner);
        assert_eq!(tag_word("with", false), PosTag::Preposition);
        assert_eq!(tag_word("and", false), PosTag::Conjunction);
        assert_eq!(tag_word("they", false), PosTag::Pronoun);
        assert_eq!(tag_word("2019", false), PosTag::Number);
    }

    #[test]
    fn test_open_classes_by_suffix() {
        assert_eq!(tag_word("quickly", false), PosTag::Adverb);
        assert_eq!(tag_word("designed", false), PosTag::Verb);
        assert_eq!(tag_word("scalable", false), PosTag::Adjective);
        assert_eq!(tag_word("pipeline", false), PosTag::Noun);
        assert_eq!(tag_word("payment", false), PosTag::Noun);
        assert_eq!(tag_word("tutorial", false), PosTag::Noun);
    }

    #[test]
    fn test_capitalised_words_mid_sentence_are_nouns() {
        assert_eq!(tag_word("Kubernetes", false), PosTag::Noun);
        assert_eq!(tag_word("Designed", true), PosTag::Verb);
    }

    #[test]
    fn test_gerund_after_noun_is_noun() {
        let tags = tag_words(&["applied", "machine", "learning"], true);
        assert_eq!(tags, vec![PosTag::Verb, PosTag::Noun, PosTag::Noun]);
    }
}
