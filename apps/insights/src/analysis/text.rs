//! Tokenization shared by the local analyzers.

use std::sync::LazyLock;

use regex::Regex;

/// Words are runs of Unicode letters and digits. They keep inner `+ # . - '`
/// so `node.js`, `c#` and `ci/cd`-style parts survive.
static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{L}\p{N}][\p{L}\p{N}+#.\-']*[\p{L}\p{N}+#]|[\p{L}\p{N}]|[^\s\p{L}\p{N}]")
        .expect("token regex is valid")
});

static SENTENCE_BREAK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+(?:\s+|$)|\n+").expect("sentence regex is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Word(&'a str),
    Punct,
}

pub fn tokens(text: &str) -> impl Iterator<Item = Token<'_>> {
    TOKEN_REGEX.find_iter(text).map(|m| {
        let s = m.as_str();
        if s.chars().next().is_some_and(char::is_alphanumeric) {
            Token::Word(s)
        } else {
            Token::Punct
        }
    })
}

/// Word tokens containing at least one letter.
pub fn words(text: &str) -> Vec<&str> {
    tokens(text)
        .filter_map(|t| match t {
            Token::Word(w) if w.chars().any(char::is_alphabetic) => Some(w),
            _ => None,
        })
        .collect()
}

/// Sentences split on terminal punctuation and line breaks; fragments without words are skipped.
pub fn sentences(text: &str) -> Vec<&str> {
    SENTENCE_BREAK_REGEX
        .split(text)
        .map(str::trim)
        .filter(|s| !words(s).is_empty())
        .collect()
}

/// Vowel-group syllable estimate with a silent trailing `e`. Never below 1.
pub fn syllables(word: &str) -> usize {
    let word: Vec<char> = word
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_lowercase)
        .collect();
    if word.is_empty() {
        return 0;
    }
    if word.len() <= 3 {
        return 1;
    }

    let is_vowel = |c: char| {
        matches!(
            c,
            'a' | 'e' | 'i' | 'o' | 'u' | 'y'
                | 'à' | 'á' | 'â' | 'ä' | 'å' | 'æ'
                | 'è' | 'é' | 'ê' | 'ë'
                | 'ì' | 'í' | 'î' | 'ï'
                | 'ò' | 'ó' | 'ô' | 'ö' | 'ø'
                | 'ù' | 'ú' | 'û' | 'ü' | 'ý'
        )
    };
    let mut count = 0;
    let mut prev_vowel = false;
    for &c in &word {
        let vowel = is_vowel(c);
        if vowel && !prev_vowel {
            count += 1;
        }
        prev_vowel = vowel;
    }

    let n = word.len();
    if word[n - 1] == 'e' && !(word[n - 2] == 'l' && !is_vowel(word[n - 3])) && count > 1 {
        count -= 1;
    }
    count.max(1)
}

pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_keep_tech_tokens_intact() {
        assert_eq!(
            words("Built node.js APIs, C# tools and CI-pipelines."),
            vec!["Built", "node.js", "APIs", "C#", "tools", "and", "CI-pipelines"]
        );
    }

    #[test]
    fn test_accented_words_stay_whole() {
        assert_eq!(
            words("Entwickler in München, Café Développeur"),
            vec!["Entwickler", "in", "München", "Café", "Développeur"]
        );
        let toks: Vec<_> = tokens("Zürich: 5ª").collect();
        assert_eq!(toks[0], Token::Word("Zürich"));
        assert_eq!(toks[1], Token::Punct);
    }

    #[test]
    fn test_punctuation_is_its_own_token() {
        let toks: Vec<_> = tokens("Rust, Go").collect();
        assert_eq!(toks, vec![Token::Word("Rust"), Token::Punct, Token::Word("Go")]);
    }

    #[test]
    fn test_sentences_split_on_punctuation_and_lines() {
        let text = "Led a team. Shipped v2!\nMentored interns\n\n- ";
        assert_eq!(
            sentences(text),
            vec!["Led a team", "Shipped v2", "Mentored interns"]
        );
    }

    #[test]
    fn test_syllables() {
        assert_eq!(syllables("cat"), 1);
        assert_eq!(syllables("engineer"), 3);
        assert_eq!(syllables("table"), 2);
        assert_eq!(syllables("make"), 1);
        assert_eq!(syllables("university"), 5);
        assert_eq!(syllables("123"), 0);
        assert_eq!(syllables("développeur"), 4);
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
