//! Text analyzers. `entities` and `sentiment` call the inference service and
//! degrade to fallbacks; everything else here is local and synchronous.

pub mod entities;
pub mod keywords;
pub mod pos;
pub mod readability;
pub mod sentiment;
pub mod stopwords;
pub mod text;

use crate::models::resume::Readability;

pub use entities::EntityAnalyzer;
pub use sentiment::SentimentAnalyzer;

/// Output of the CPU-bound analysis stage.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalAnalysis {
    pub readability: Readability,
    pub keywords: Vec<String>,
    pub important_phrases: Vec<String>,
}

/// Readability, keywords and phrases in one pass. Intended for `spawn_blocking`.
pub fn analyze_locally(text: &str) -> LocalAnalysis {
    LocalAnalysis {
        readability: readability::compute_readability(text),
        keywords: keywords::extract_keywords(text),
        important_phrases: keywords::extract_important_phrases(text),
    }
}
