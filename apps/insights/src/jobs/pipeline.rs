//! One analysis job end to end: extract, fan out to the three analysis
//! stages, score, publish to the cache, persist.

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::analysis::{analyze_locally, EntityAnalyzer, SentimentAnalyzer};
use crate::cache::CacheLayer;
use crate::errors::AppError;
use crate::extraction::extract_document;
use crate::inference::InferenceBackend;
use crate::models::job::AnalysisJob;
use crate::models::resume::{AnalysisRecord, AnalysisResult};
use crate::persistence::{ProfileUpdate, ResumeStore};
use crate::scoring::{assess_skills, build_result};

/// Executes one attempt of an analysis job. The queue owns retries.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, job: &AnalysisJob) -> Result<AnalysisResult, AppError>;
}

#[derive(Clone)]
pub struct AnalysisPipeline {
    entities: EntityAnalyzer,
    sentiment: SentimentAnalyzer,
    cache: CacheLayer,
    store: Arc<dyn ResumeStore>,
}

impl AnalysisPipeline {
    pub fn new(
        inference: Arc<dyn InferenceBackend>,
        cache: CacheLayer,
        store: Arc<dyn ResumeStore>,
    ) -> Self {
        Self {
            entities: EntityAnalyzer::new(Arc::clone(&inference), cache.clone()),
            sentiment: SentimentAnalyzer::new(inference),
            cache,
            store,
        }
    }

    /// Runs the three analysis stages concurrently and waits for all of them.
    /// Entity and sentiment stages degrade on their own; a panic in the local
    /// stage fails the job.
    pub async fn analyze(&self, text: String) -> Result<AnalysisResult, AppError> {
        let text: Arc<str> = Arc::from(text);
        let local_text = Arc::clone(&text);

        let (entities, sentiment, local) = tokio::join!(
            self.entities.extract_entities(&text),
            self.sentiment.analyze_sentiment(&text),
            tokio::task::spawn_blocking(move || analyze_locally(&local_text)),
        );
        let local =
            local.map_err(|e| AppError::Internal(anyhow!("Local analysis stage failed: {e}")))?;

        Ok(build_result(local, sentiment, entities))
    }
}

#[async_trait]
impl JobProcessor for AnalysisPipeline {
    async fn process(&self, job: &AnalysisJob) -> Result<AnalysisResult, AppError> {
        let text = extract_document(&job.document_path, job.document_type).await?;
        if text.trim().is_empty() {
            return Err(AppError::EmptyDocument);
        }
        debug!(job_id = %job.id, chars = text.len(), "Document text extracted");

        let result = self.analyze(text).await?;
        if result.entities.is_empty() {
            warn!(job_id = %job.id, "No entities recognised; skills will be empty");
        }
        let skills = assess_skills(&result.entities.skills);

        // Skills are persisted by `publish_analysis` under the user's lock.
        self.cache
            .publish_analysis(job.user_id, &result, skills)
            .await?;

        let record = AnalysisRecord::from_result(job, &result)?;
        self.store.save(&record).await?;
        self.store
            .update(
                job.user_id,
                ProfileUpdate {
                    latest_score: Some(result.score),
                    latest_job_id: Some(job.id),
                    ..ProfileUpdate::default()
                },
            )
            .await?;

        info!(job_id = %job.id, user_id = %job.user_id, score = result.score, "Analysis published");
        Ok(result)
    }
}
