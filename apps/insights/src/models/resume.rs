use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::skill::SkillRecord;

/// Sentiment classification for a whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sentiment {
    pub label: String,
    pub score: f64,
    pub all_results: Vec<LabelScore>,
}

impl Sentiment {
    /// Returned whenever the classifier is unreachable or answers garbage.
    pub fn neutral() -> Self {
        Self {
            label: "neutral".to_string(),
            score: 1.0,
            all_results: vec![],
        }
    }
}

/// One `{label, score}` pair from a classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Readability {
    pub sentence_count: usize,
    pub word_count: usize,
    pub avg_sentence_length: f64,
    pub avg_word_length: f64,
    pub flesch_score: f64,
    pub flesch_grade_level: f64,
    pub difficult_words: usize,
}

/// Entity buckets. Each list is deduplicated, lowercased and sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    pub skills: Vec<String>,
    pub companies: Vec<String>,
    pub titles: Vec<String>,
    pub education: Vec<String>,
    pub certifications: Vec<String>,
}

impl Entities {
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
            && self.companies.is_empty()
            && self.titles.is_empty()
            && self.education.is_empty()
            && self.certifications.is_empty()
    }
}

/// Output of one completed analysis job. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub score: u8,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub keywords: Vec<String>,
    pub important_phrases: Vec<String>,
    pub sentiment: Sentiment,
    pub readability: Readability,
    pub entities: Entities,
}

/// Durable row written through the persistence collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_id: Uuid,
    pub document_type: String,
    pub score: i16,
    pub result: Value,
    pub created_at: DateTime<Utc>,
}

/// What the dashboard renders for a user: the latest analysis plus merged skills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub score: u8,
    pub analysis: AnalysisResult,
    pub skills: Vec<SkillRecord>,
    pub updated_at: DateTime<Utc>,
}
