//! Durable storage for completed analyses and per-user profile aggregates.
//!
//! The pipeline writes through `save` + `update`. The cache layer reads
//! `profile` and `latest_analysis` back when its entries have expired, and the
//! scheduler lists active users. Queries are runtime-checked (`sqlx::query`),
//! so the crate builds without a live database.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::AnalysisJob;
use crate::models::resume::{AnalysisRecord, AnalysisResult};
use crate::models::skill::SkillRecord;

/// Rolled-up view written by the weekly maintenance task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub skill_count: usize,
    pub average_progress: f64,
    pub top_gaps: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Partial profile update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub latest_score: Option<u8>,
    pub latest_job_id: Option<Uuid>,
    pub skills: Option<Vec<SkillRecord>>,
    pub weekly_summary: Option<WeeklySummary>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProfile {
    pub latest_score: Option<u8>,
    pub latest_job_id: Option<Uuid>,
    pub skills: Vec<SkillRecord>,
    pub weekly_summary: Option<WeeklySummary>,
}

impl UserProfile {
    fn apply(&mut self, update: ProfileUpdate) {
        if let Some(score) = update.latest_score {
            self.latest_score = Some(score);
        }
        if let Some(job_id) = update.latest_job_id {
            self.latest_job_id = Some(job_id);
        }
        if let Some(skills) = update.skills {
            self.skills = skills;
        }
        if let Some(summary) = update.weekly_summary {
            self.weekly_summary = Some(summary);
        }
    }
}

impl AnalysisRecord {
    pub fn from_result(job: &AnalysisJob, result: &AnalysisResult) -> Result<Self, AppError> {
        let value = serde_json::to_value(result)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize result: {e}")))?;
        Ok(Self {
            id: Uuid::new_v4(),
            user_id: job.user_id,
            job_id: job.id,
            document_type: job.document_type.to_string(),
            score: i16::from(result.score),
            result: value,
            created_at: Utc::now(),
        })
    }
}

#[async_trait]
pub trait ResumeStore: Send + Sync {
    async fn save(&self, record: &AnalysisRecord) -> Result<(), AppError>;

    async fn update(&self, user_id: Uuid, update: ProfileUpdate) -> Result<(), AppError>;

    async fn profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError>;

    /// Most recently saved analysis for `user_id`.
    async fn latest_analysis(&self, user_id: Uuid) -> Result<Option<AnalysisRecord>, AppError>;

    /// Users with at least one stored profile, most recently updated first.
    async fn active_users(&self) -> Result<Vec<Uuid>, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL
// ────────────────────────────────────────────────────────────────────────────

pub struct PgResumeStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct ProfileRow {
    latest_score: Option<i16>,
    latest_job_id: Option<Uuid>,
    skills: serde_json::Value,
    weekly_summary: Option<serde_json::Value>,
}

impl TryFrom<ProfileRow> for UserProfile {
    type Error = AppError;

    fn try_from(row: ProfileRow) -> Result<Self, AppError> {
        let corrupt = |e: serde_json::Error| {
            AppError::Internal(anyhow::anyhow!("Corrupt user_profiles row: {e}"))
        };
        Ok(UserProfile {
            latest_score: row.latest_score.and_then(|s| u8::try_from(s).ok()),
            latest_job_id: row.latest_job_id,
            skills: serde_json::from_value(row.skills).map_err(corrupt)?,
            weekly_summary: row
                .weekly_summary
                .map(serde_json::from_value)
                .transpose()
                .map_err(corrupt)?,
        })
    }
}

impl PgResumeStore {
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }
}

#[async_trait]
impl ResumeStore for PgResumeStore {
    async fn save(&self, record: &AnalysisRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO resume_analyses (id, user_id, job_id, document_type, score, result, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (job_id) DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(record.job_id)
        .bind(&record.document_type)
        .bind(record.score)
        .bind(&record.result)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        debug!(job_id = %record.job_id, "Analysis record saved");
        Ok(())
    }

    async fn update(&self, user_id: Uuid, update: ProfileUpdate) -> Result<(), AppError> {
        let skills = update
            .skills
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| AppError::Internal(e.into()))?;
        let summary = update
            .weekly_summary
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| AppError::Internal(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO user_profiles (user_id, latest_score, latest_job_id, skills, weekly_summary, updated_at)
            VALUES ($1, $2, $3, COALESCE($4, '[]'::jsonb), $5, NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                latest_score   = COALESCE(EXCLUDED.latest_score, user_profiles.latest_score),
                latest_job_id  = COALESCE(EXCLUDED.latest_job_id, user_profiles.latest_job_id),
                skills         = COALESCE($4, user_profiles.skills),
                weekly_summary = COALESCE(EXCLUDED.weekly_summary, user_profiles.weekly_summary),
                updated_at     = NOW()
            "#,
        )
        .bind(user_id)
        .bind(update.latest_score.map(i16::from))
        .bind(update.latest_job_id)
        .bind(skills)
        .bind(summary)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT latest_score, latest_job_id, skills, weekly_summary
            FROM user_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserProfile::try_from).transpose()
    }

    async fn latest_analysis(&self, user_id: Uuid) -> Result<Option<AnalysisRecord>, AppError> {
        Ok(sqlx::query_as::<_, AnalysisRecord>(
            r#"
            SELECT id, user_id, job_id, document_type, score, result, created_at
            FROM resume_analyses
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn active_users(&self) -> Result<Vec<Uuid>, AppError> {
        let users: Vec<Uuid> =
            sqlx::query_scalar("SELECT user_id FROM user_profiles ORDER BY updated_at DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(users)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory (tests, local runs without Postgres)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryResumeStore {
    records: RwLock<Vec<AnalysisRecord>>,
    profiles: RwLock<HashMap<Uuid, (UserProfile, DateTime<Utc>)>>,
}

impl InMemoryResumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn records(&self) -> Vec<AnalysisRecord> {
        self.records.read().await.clone()
    }

}

#[async_trait]
impl ResumeStore for InMemoryResumeStore {
    async fn save(&self, record: &AnalysisRecord) -> Result<(), AppError> {
        let mut records = self.records.write().await;
        if !records.iter().any(|r| r.job_id == record.job_id) {
            records.push(record.clone());
        }
        Ok(())
    }

    async fn update(&self, user_id: Uuid, update: ProfileUpdate) -> Result<(), AppError> {
        let mut profiles = self.profiles.write().await;
        let entry = profiles
            .entry(user_id)
            .or_insert_with(|| (UserProfile::default(), Utc::now()));
        entry.0.apply(update);
        entry.1 = Utc::now();
        Ok(())
    }

    async fn profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError> {
        Ok(self
            .profiles
            .read()
            .await
            .get(&user_id)
            .map(|(profile, _)| profile.clone()))
    }

    async fn latest_analysis(&self, user_id: Uuid) -> Result<Option<AnalysisRecord>, AppError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn active_users(&self) -> Result<Vec<Uuid>, AppError> {
        let profiles = self.profiles.read().await;
        let mut users: Vec<(Uuid, DateTime<Utc>)> =
            profiles.iter().map(|(id, (_, at))| (*id, *at)).collect();
        users.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(users.into_iter().map(|(id, _)| id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::models::job::DocumentType;
    use crate::scoring::tests::sample_result;

    #[tokio::test]
    async fn test_save_is_idempotent_per_job() {
        let store = InMemoryResumeStore::new();
        let path = PathBuf::from("/tmp/r.txt");
        let job = AnalysisJob::new(Uuid::new_v4(), path, DocumentType::PlainText);
        let record = AnalysisRecord::from_result(&job, &sample_result(81)).unwrap();
        assert_eq!(record.score, 81);
        assert_eq!(record.document_type, "plain_text");

        store.save(&record).await.unwrap();
        store.save(&record).await.unwrap();
        assert_eq!(store.records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let store = InMemoryResumeStore::new();
        let user = Uuid::new_v4();
        let job_id = Uuid::new_v4();
        store
            .update(
                user,
                ProfileUpdate {
                    latest_score: Some(72),
                    latest_job_id: Some(job_id),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();
        store
            .update(
                user,
                ProfileUpdate {
                    latest_score: Some(90),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();

        let profile = store.profile(user).await.unwrap().unwrap();
        assert_eq!(profile.latest_score, Some(90));
        assert_eq!(profile.latest_job_id, Some(job_id));
        assert_eq!(store.active_users().await.unwrap(), vec![user]);
    }

    #[tokio::test]
    async fn test_latest_analysis_is_most_recent_for_user() {
        let store = InMemoryResumeStore::new();
        let user = Uuid::new_v4();
        let path = PathBuf::from("/tmp/r.txt");

        let older_job = AnalysisJob::new(user, path.clone(), DocumentType::PlainText);
        let mut older = AnalysisRecord::from_result(&older_job, &sample_result(60)).unwrap();
        older.created_at -= chrono::Duration::hours(2);
        let newer_job = AnalysisJob::new(user, path.clone(), DocumentType::PlainText);
        let newer = AnalysisRecord::from_result(&newer_job, &sample_result(75)).unwrap();
        let other_job = AnalysisJob::new(Uuid::new_v4(), path, DocumentType::PlainText);
        let other = AnalysisRecord::from_result(&other_job, &sample_result(99)).unwrap();

        for record in [&newer, &older, &other] {
            store.save(record).await.unwrap();
        }

        let latest = store.latest_analysis(user).await.unwrap().unwrap();
        assert_eq!(latest.job_id, newer_job.id);
        assert!(store.latest_analysis(Uuid::new_v4()).await.unwrap().is_none());
        assert!(store.profile(user).await.unwrap().is_none());
    }
}
