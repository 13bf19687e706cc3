use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Common article shape every content source is normalized into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: String,
    pub url: String,
    pub description: String,
    /// Primary tag, lowercased. Compared against skill names when ranking.
    pub tag: String,
    pub published_at: Option<DateTime<Utc>>,
    pub reading_time_minutes: u32,
    pub source: String,
}

/// An article scored against one of the user's skill gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedArticle {
    #[serde(flatten)]
    pub article: Article,
    pub skill: String,
    pub relevance: f64,
}
