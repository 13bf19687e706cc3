//! Pure scoring over analyzer outputs. No I/O.

pub mod feedback;
pub mod skills;

use crate::analysis::LocalAnalysis;
use crate::models::resume::{AnalysisResult, Entities, Readability, Sentiment};

pub use feedback::{find_improvements, find_strengths};
pub use skills::assess_skills;

/// Keywords and phrases kept on a result.
const MAX_KEYWORDS: usize = 20;
const MAX_PHRASES: usize = 10;

const BASE_SCORE: f64 = 70.0;

/// Overall resume score, clamped to 0–100.
///
/// base 70, +10 confident positive tone, +5 Flesch > 60, +5 average sentence
/// under 20 words, +2 per skill (max 20), +1 per company (max 10),
/// +0.5 per keyword (max 10).
pub fn score(
    sentiment: &Sentiment,
    entities: &Entities,
    readability: &Readability,
    keyword_count: usize,
) -> u8 {
    let mut total = BASE_SCORE;
    if sentiment.is_confidently_positive() {
        total += 10.0;
    }
    if readability.flesch_score > 60.0 {
        total += 5.0;
    }
    if readability.avg_sentence_length < 20.0 {
        total += 5.0;
    }
    total += (entities.skills.len() as f64 * 2.0).min(20.0);
    total += (entities.companies.len() as f64).min(10.0);
    total += (keyword_count as f64 * 0.5).min(10.0);

    total.round().clamp(0.0, 100.0) as u8
}

/// Combines the three analysis stages into the immutable job result.
pub fn build_result(
    local: LocalAnalysis,
    sentiment: Sentiment,
    entities: Entities,
) -> AnalysisResult {
    let LocalAnalysis {
        readability,
        mut keywords,
        mut important_phrases,
    } = local;
    keywords.truncate(MAX_KEYWORDS);
    important_phrases.truncate(MAX_PHRASES);

    let score = score(&sentiment, &entities, &readability, keywords.len());
    let strengths =
        find_strengths(&entities, &keywords, &important_phrases, &sentiment, &readability);
    let improvements =
        find_improvements(&entities, &keywords, &important_phrases, &sentiment, &readability);

    AnalysisResult {
        score,
        strengths,
        improvements,
        keywords,
        important_phrases,
        sentiment,
        readability,
        entities,
    }
}
