//! Rule-based strengths and improvement bullets.
//!
//! Each rule is a threshold over one analyzer output. Both functions fall
//! back to a generic bullet so the dashboard never renders an empty list.

use crate::models::resume::{Entities, Readability, Sentiment};

const STRENGTH_FALLBACK: &str = "Your resume covers the essentials of your experience.";
const IMPROVEMENT_FALLBACK: &str =
    "Tailor your resume to each role by mirroring the key terms from the job description.";

pub fn find_strengths(
    entities: &Entities,
    keywords: &[String],
    phrases: &[String],
    sentiment: &Sentiment,
    readability: &Readability,
) -> Vec<String> {
    let mut strengths = Vec::new();

    if entities.skills.len() >= 5 {
        strengths.push(format!(
            "Strong technical breadth with {} identified skills.",
            entities.skills.len()
        ));
    }
    if entities.companies.len() >= 2 {
        strengths.push("Experience across multiple organizations.".to_string());
    }
    if !entities.certifications.is_empty() {
        strengths.push("Professional certifications strengthen your credibility.".to_string());
    }
    if !entities.education.is_empty() {
        strengths.push("Clearly stated educational background.".to_string());
    }
    if keywords.len() >= 15 {
        strengths.push("Rich, varied vocabulary of relevant terms.".to_string());
    }
    if phrases.len() >= 5 {
        strengths.push("Uses specific, descriptive phrasing.".to_string());
    }
    if sentiment.is_confidently_positive() {
        strengths.push("Confident, positive tone throughout.".to_string());
    }
    if readability.flesch_score > 60.0 {
        strengths.push("Easy to read and skim.".to_string());
    }

    if strengths.is_empty() {
        strengths.push(STRENGTH_FALLBACK.to_string());
    }
    strengths
}

pub fn find_improvements(
    entities: &Entities,
    keywords: &[String],
    phrases: &[String],
    sentiment: &Sentiment,
    readability: &Readability,
) -> Vec<String> {
    let mut improvements = Vec::new();

    if entities.skills.len() < 3 {
        improvements.push("List more of your technical skills explicitly.".to_string());
    }
    if entities.companies.is_empty() {
        improvements.push("Name the organizations you have worked for.".to_string());
    }
    if entities.certifications.is_empty() {
        improvements.push("Consider adding relevant certifications.".to_string());
    }
    if keywords.len() < 10 {
        improvements.push("Add more industry-specific keywords.".to_string());
    }
    if phrases.len() < 3 {
        improvements.push("Describe your work with more specific phrases.".to_string());
    }
    if sentiment.label.eq_ignore_ascii_case("negative") {
        improvements
            .push("Reframe your experience using achievement-oriented language.".to_string());
    }
    if readability.avg_sentence_length >= 20.0 {
        improvements.push("Shorten long sentences into concise bullet points.".to_string());
    }
    if readability.word_count > 0 && readability.flesch_score < 30.0 {
        improvements.push("Simplify dense wording to improve readability.".to_string());
    }

    if improvements.is_empty() {
        improvements.push(IMPROVEMENT_FALLBACK.to_string());
    }
    improvements
}
