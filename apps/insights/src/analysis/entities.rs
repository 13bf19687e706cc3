//! Entity extraction: hosted NER model first, lexicon/regex heuristics on failure.
//!
//! Results are cached under a SHA-256 of the input text: extraction is
//! deterministic for a given text, so identical uploads from any user share
//! one entry. Heuristic results are not cached, so the next upload of the
//! same text retries the model.

use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::analysis::stopwords::is_stop_word;
use crate::cache::{CacheLayer, Namespace};
use crate::inference::{InferenceBackend, TaggedToken};
use crate::models::resume::Entities;

/// Technology vocabulary shared by tag mapping and the heuristic pass.
pub const TECH_SKILLS: &[&str] = &[
    "javascript", "typescript", "python", "java", "rust", "golang", "c++", "c#", "ruby", "php",
    "swift", "kotlin", "scala", "react", "angular", "vue", "svelte", "next.js", "node.js",
    "express", "django", "flask", "fastapi", "spring", "rails", "html", "css", "sass", "graphql",
    "rest", "sql", "postgresql", "mysql", "mongodb", "redis", "elasticsearch", "kafka",
    "rabbitmq", "docker", "kubernetes", "terraform", "ansible", "jenkins", "aws", "azure", "gcp",
    "linux", "git", "tensorflow", "pytorch", "pandas", "spark", "hadoop", "figma", "excel",
    "tableau", "machine learning", "data analysis", "ci/cd", "microservices",
];

const KNOWN_COMPANIES: &[&str] = &[
    "google", "microsoft", "amazon", "meta", "facebook", "apple", "netflix", "ibm", "oracle",
    "intel", "nvidia", "salesforce", "adobe", "uber", "airbnb", "spotify", "stripe", "shopify",
    "twitter", "linkedin", "accenture", "deloitte", "infosys", "tcs", "wipro", "cisco", "sap",
];

const EDUCATION_KEYWORDS: &[&str] = &[
    "university", "college", "institute", "school", "academy", "polytechnic",
];

const ROLE_KEYWORDS: &[&str] = &[
    "engineer", "developer", "manager", "analyst", "designer", "architect", "scientist",
    "consultant", "intern", "administrator", "director", "lead", "officer", "specialist",
];

static COMPANY_SUFFIX_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][A-Za-z0-9&]*(?:\s+[A-Z][A-Za-z0-9&]*)*\s+(?:Inc|LLC|Ltd|Corp|Corporation|Technologies|Labs|GmbH)\b")
        .expect("company regex is valid")
});

static TITLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:(?:senior|junior|lead|staff|principal|chief|head)\s+)?(?:[a-z]+\s+)?(?:engineer|developer|manager|analyst|designer|architect|scientist|consultant|intern|administrator|director)\b")
        .expect("title regex is valid")
});

static INSTITUTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:(?:University|College|Institute|School|Academy) of(?:\s+[A-Z][A-Za-z]+)+|[A-Z][A-Za-z]+(?:\s+[A-Z][A-Za-z]+)*\s+(?:University|College|Institute))\b")
        .expect("institution regex is valid")
});

static DEGREE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:bachelor(?:'s)?|master(?:'s)?|ph\.?d|mba|b\.?sc|m\.?sc|b\.?tech|m\.?tech)\b(?:\s+(?:of|in)\s+[a-z]+(?:\s+[a-z]+)?)?")
        .expect("degree regex is valid")
});

static CERTIFICATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:(?:aws|azure|google cloud|microsoft|oracle|cisco)\s+)?certified(?:\s+[a-z]+){1,3}|\b(?:PMP|CISSP|CCNA|CCNP|CKAD|CKA|CompTIA\s+[A-Za-z+]+)\b")
        .expect("certification regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Skills,
    Companies,
    Titles,
    Education,
    Certifications,
}

#[derive(Default)]
struct EntitySets {
    skills: BTreeSet<String>,
    companies: BTreeSet<String>,
    titles: BTreeSet<String>,
    education: BTreeSet<String>,
    certifications: BTreeSet<String>,
}

impl EntitySets {
    fn insert(&mut self, bucket: Bucket, raw: &str) {
        let value = normalize(raw);
        if value.chars().count() < 2 {
            return;
        }
        let set = match bucket {
            Bucket::Skills => &mut self.skills,
            Bucket::Companies => &mut self.companies,
            Bucket::Titles => &mut self.titles,
            Bucket::Education => &mut self.education,
            Bucket::Certifications => &mut self.certifications,
        };
        set.insert(value);
    }

    fn into_entities(self) -> Entities {
        Entities {
            skills: self.skills.into_iter().collect(),
            companies: self.companies.into_iter().collect(),
            titles: self.titles.into_iter().collect(),
            education: self.education.into_iter().collect(),
            certifications: self.certifications.into_iter().collect(),
        }
    }
}

#[derive(Clone)]
pub struct EntityAnalyzer {
    inference: Arc<dyn InferenceBackend>,
    cache: CacheLayer,
}

impl EntityAnalyzer {
    pub fn new(inference: Arc<dyn InferenceBackend>, cache: CacheLayer) -> Self {
        Self { inference, cache }
    }

    /// Always returns a well-formed (possibly empty) result.
    pub async fn extract_entities(&self, text: &str) -> Entities {
        let hash = content_hash(text);
        if let Some(cached) = self.cache.get::<Entities>(Namespace::Ner, &hash, None).await {
            debug!(hash = %hash, "NER cache hit");
            return cached;
        }

        match self.inference.tag_entities(text).await {
            Ok(tokens) => {
                let entities = entities_from_tokens(&tokens);
                if let Err(e) = self.cache.set(Namespace::Ner, &hash, &entities, None).await {
                    warn!(hash = %hash, "Failed to cache NER result: {e}");
                }
                entities
            }
            Err(e) => {
                warn!("NER inference failed, using heuristic extraction: {e}");
                heuristic_entities(text)
            }
        }
    }
}

pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Lowercases, collapses whitespace and trims surrounding punctuation.
fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
        .to_lowercase()
}

fn contains_any(value: &str, keywords: &[&str]) -> bool {
    let lower = value.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

/// Maps one tagged span to a bucket. `B-`/`I-` prefixes are ignored.
fn bucket_for(tag: &str, word: &str) -> Option<Bucket> {
    let tag = tag
        .trim_start_matches("B-")
        .trim_start_matches("I-")
        .to_uppercase();
    match tag.as_str() {
        "SKILL" | "SKILLS" | "TECH" | "TECHNOLOGY" => Some(Bucket::Skills),
        "MISC" if TECH_SKILLS.contains(&normalize(word).as_str()) => Some(Bucket::Skills),
        "ORG" if contains_any(word, EDUCATION_KEYWORDS) => Some(Bucket::Education),
        "ORG" => Some(Bucket::Companies),
        "PER" if contains_any(word, ROLE_KEYWORDS) => Some(Bucket::Titles),
        "TITLE" | "DESIGNATION" => Some(Bucket::Titles),
        "EDU" | "EDUCATION" | "DEGREE" => Some(Bucket::Education),
        "CERT" | "CERTIFICATION" => Some(Bucket::Certifications),
        _ => None,
    }
}

/// Rebuilds spans from word-piece (`##`) and `I-` continuation tokens, then buckets them.
pub fn entities_from_tokens(tokens: &[TaggedToken]) -> Entities {
    let mut spans: Vec<(String, String)> = Vec::new();

    for token in tokens {
        let base = token
            .entity
            .trim_start_matches("B-")
            .trim_start_matches("I-")
            .to_string();
        if let Some(piece) = token.word.strip_prefix("##") {
            if let Some((_, word)) = spans.last_mut() {
                word.push_str(piece);
                continue;
            }
        }
        let continues = token.entity.starts_with("I-")
            && spans.last().is_some_and(|(tag, _)| *tag == base);
        if continues {
            if let Some((_, word)) = spans.last_mut() {
                word.push(' ');
                word.push_str(&token.word);
            }
        } else {
            spans.push((base, token.word.clone()));
        }
    }

    let mut sets = EntitySets::default();
    for (tag, word) in &spans {
        if let Some(bucket) = bucket_for(tag, word) {
            sets.insert(bucket, word);
        }
    }
    sets.into_entities()
}

/// Lower-recall extraction from fixed vocabularies and patterns.
pub fn heuristic_entities(text: &str) -> Entities {
    let lower = text.to_lowercase();
    let mut sets = EntitySets::default();

    for skill in TECH_SKILLS {
        if contains_term(&lower, skill) {
            sets.insert(Bucket::Skills, skill);
        }
    }
    for company in KNOWN_COMPANIES {
        if contains_term(&lower, company) {
            sets.insert(Bucket::Companies, company);
        }
    }
    for m in COMPANY_SUFFIX_REGEX.find_iter(text) {
        sets.insert(Bucket::Companies, m.as_str());
    }
    for m in TITLE_REGEX.find_iter(text) {
        let title: Vec<&str> = m
            .as_str()
            .split_whitespace()
            .skip_while(|w| is_stop_word(w))
            .collect();
        if title.len() > 1 || title.iter().any(|w| contains_any(w, ROLE_KEYWORDS)) {
            sets.insert(Bucket::Titles, &title.join(" "));
        }
    }
    for m in INSTITUTION_REGEX
        .find_iter(text)
        .chain(DEGREE_REGEX.find_iter(text))
    {
        sets.insert(Bucket::Education, m.as_str());
    }
    for m in CERTIFICATION_REGEX.find_iter(text) {
        sets.insert(Bucket::Certifications, m.as_str());
    }

    sets.into_entities()
}

/// Whole-term match: the neighbours of a hit must not be word characters.
fn contains_term(haystack: &str, term: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '+' || c == '#';
    haystack.match_indices(term).any(|(idx, _)| {
        let before = haystack[..idx].chars().next_back();
        let after = haystack[idx + term.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::tests::{token, ScriptedInference};

    const RESUME: &str = "Jane Doe\nSenior Software Engineer at Google. Previously a backend developer \
        at Acme Labs. Skills: JavaScript, Python, Docker, Kubernetes. \
        B.Sc in Computer Science, Stanford University. AWS Certified Solutions Architect.";

    #[test]
    fn test_tokens_map_to_buckets() {
        let tokens = vec![
            token("Google", "B-ORG"),
            token("Stanford", "B-ORG"),
            token("University", "I-ORG"),
            token("Java", "B-MISC"),
            token("##Script", "I-MISC"),
            token("Jane", "B-PER"),
            token("Paris", "B-LOC"),
            token("AWS Certified Developer", "CERT"),
        ];
        let entities = entities_from_tokens(&tokens);
        assert_eq!(entities.companies, vec!["google"]);
        assert_eq!(entities.education, vec!["stanford university"]);
        assert_eq!(entities.skills, vec!["javascript"]);
        assert!(entities.titles.is_empty());
        assert_eq!(entities.certifications, vec!["aws certified developer"]);
    }

    #[test]
    fn test_person_tokens_need_a_role_keyword() {
        let tokens = vec![token("Lead Engineer", "PER"), token("John", "PER")];
        assert_eq!(entities_from_tokens(&tokens).titles, vec!["lead engineer"]);
    }

    #[test]
    fn test_duplicates_collapse_after_normalization() {
        let tokens = vec![
            token("Google", "ORG"),
            token("  GOOGLE ", "ORG"),
            token("google,", "ORG"),
        ];
        assert_eq!(entities_from_tokens(&tokens).companies, vec!["google"]);
    }

    #[test]
    fn test_heuristic_pass() {
        let entities = heuristic_entities(RESUME);
        for skill in ["javascript", "python", "docker", "kubernetes"] {
            assert!(entities.skills.contains(&skill.to_string()), "missing {skill}");
        }
        assert!(!entities.skills.contains(&"java".to_string()));
        assert!(entities.companies.contains(&"google".to_string()));
        assert!(entities.companies.contains(&"acme labs".to_string()));
        assert!(entities.titles.contains(&"senior software engineer".to_string()));
        assert!(entities.titles.contains(&"backend developer".to_string()));
        assert!(entities.education.contains(&"stanford university".to_string()));
        assert!(entities
            .certifications
            .iter()
            .any(|c| c.starts_with("aws certified solutions")));
    }

    #[test]
    fn test_heuristic_on_empty_text() {
        assert!(heuristic_entities("").is_empty());
    }

    #[test]
    fn test_contains_term_respects_boundaries() {
        assert!(contains_term("skills: rust, go", "rust"));
        assert!(!contains_term("trustworthy", "rust"));
        assert!(contains_term("node.js and c++", "c++"));
        assert!(!contains_term("javascript", "java"));
    }

    #[tokio::test]
    async fn test_inference_failure_falls_back_and_is_not_cached() {
        let cache = CacheLayer::in_memory();
        let analyzer = EntityAnalyzer::new(Arc::new(ScriptedInference::failing()), cache.clone());

        let entities = analyzer.extract_entities(RESUME).await;
        assert!(entities.companies.contains(&"google".to_string()));

        let cached: Option<Entities> = cache.get(Namespace::Ner, &content_hash(RESUME), None).await;
        assert!(cached.is_none());
    }

    #[tokio::test]
    async fn test_model_result_is_cached_by_content_hash() {
        let cache = CacheLayer::in_memory();
        let analyzer = EntityAnalyzer::new(
            Arc::new(ScriptedInference::answering(vec![], vec![token("Google", "ORG")])),
            cache.clone(),
        );
        analyzer.extract_entities("Engineer at Google").await;

        // A failing backend now gets served from the cache.
        let offline = EntityAnalyzer::new(Arc::new(ScriptedInference::failing()), cache);
        let entities = offline.extract_entities("Engineer at Google").await;
        assert_eq!(entities.companies, vec!["google"]);
        assert!(entities.titles.is_empty());
    }
}
