use std::sync::Arc;

use tracing::{debug, warn};

use crate::analysis::text::truncate_chars;
use crate::inference::InferenceBackend;
use crate::models::resume::Sentiment;

/// Classifier input cap. Resume tone is settled well within the opening text.
const MAX_SENTIMENT_CHARS: usize = 1000;

/// Confidence a positive label needs before it counts toward the score.
pub const POSITIVE_THRESHOLD: f64 = 0.7;

#[derive(Clone)]
pub struct SentimentAnalyzer {
    inference: Arc<dyn InferenceBackend>,
}

impl SentimentAnalyzer {
    pub fn new(inference: Arc<dyn InferenceBackend>) -> Self {
        Self { inference }
    }

    /// Never fails: an unreachable or empty classifier yields `Sentiment::neutral()`.
    pub async fn analyze_sentiment(&self, text: &str) -> Sentiment {
        let input = truncate_chars(text, MAX_SENTIMENT_CHARS);
        let mut labels = match self.inference.classify(input).await {
            Ok(labels) => labels,
            Err(e) => {
                warn!("Sentiment inference failed, defaulting to neutral: {e}");
                return Sentiment::neutral();
            }
        };

        labels.sort_by(|a, b| b.score.total_cmp(&a.score));
        let Some(top) = labels.first().cloned() else {
            warn!("Sentiment classifier returned no labels, defaulting to neutral");
            return Sentiment::neutral();
        };
        debug!(label = %top.label, score = top.score, "Sentiment classified");

        Sentiment {
            label: top.label.to_lowercase(),
            score: top.score,
            all_results: labels,
        }
    }
}

impl Sentiment {
    pub fn is_confidently_positive(&self) -> bool {
        self.label.eq_ignore_ascii_case("positive") && self.score > POSITIVE_THRESHOLD
    }
}
