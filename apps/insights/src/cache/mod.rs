//! Cache layer: namespaced, TTL-bound derived state for the dashboard.
//!
//! Entries are disposable: every read treats a store error or an unreadable
//! payload as a miss, so callers recompute instead of failing. Skills and the
//! dashboard are backed by the profile store: skill writes go there first, and
//! a miss on either namespace is rebuilt from it and written back.
//!
//! Writes that merge with existing state (`set_skill_progress`,
//! `update_skill_progress`, `publish_analysis`) and rebuilds hold a per-user
//! lock for their read-modify-write.

pub mod keys;
pub mod store;

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use anyhow::anyhow;
use futures::future::join_all;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::JobOutcome;
use crate::models::resume::{AnalysisResult, DashboardView};
use crate::models::skill::SkillRecord;
use crate::persistence::{ProfileUpdate, ResumeStore};

pub use keys::{cache_key, Namespace, USER_NAMESPACES};
pub use store::{CacheStore, InMemoryStore, RedisStore};

#[derive(Clone)]
pub struct CacheLayer {
    store: Arc<dyn CacheStore>,
    profiles: Arc<dyn ResumeStore>,
    user_locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl CacheLayer {
    pub fn new(store: Arc<dyn CacheStore>, profiles: Arc<dyn ResumeStore>) -> Self {
        Self {
            store,
            profiles,
            user_locks: Arc::new(DashMap::new()),
        }
    }

    /// A cache over fresh process-local stores.
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(crate::persistence::InMemoryResumeStore::new()),
        )
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        namespace: Namespace,
        subject: &str,
        extra: Option<&str>,
    ) -> Option<T> {
        let key = cache_key(namespace, subject, extra);
        let raw = match self.store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, "Cache read failed, treating as miss: {e}");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, "Discarding unreadable cache entry: {e}");
                if let Err(e) = self.store.delete(&key).await {
                    warn!(key = %key, "Failed to discard unreadable cache entry: {e}");
                }
                None
            }
        }
    }

    /// Writes `value` with the namespace's fixed TTL.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        namespace: Namespace,
        subject: &str,
        value: &T,
        extra: Option<&str>,
    ) -> Result<(), AppError> {
        let key = cache_key(namespace, subject, extra);
        let raw = serde_json::to_string(value)
            .map_err(|e| AppError::Cache(format!("Failed to serialize {key}: {e}")))?;
        self.store.set(&key, raw, namespace.ttl()).await?;
        debug!(key = %key, "Cache entry written");
        Ok(())
    }

    pub async fn invalidate(&self, namespace: Namespace, subject: &str) -> Result<bool, AppError> {
        self.store
            .delete(&cache_key(namespace, subject, None))
            .await
    }

    /// Drops every per-user namespace concurrently. A failed delete is logged
    /// and does not stop the others. Returns the number of namespaces that failed.
    pub async fn invalidate_all(&self, user_id: Uuid) -> usize {
        let subject = user_id.to_string();
        let subject = subject.as_str();
        let deletes = USER_NAMESPACES
            .iter()
            .map(|ns| async move { (*ns, self.invalidate(*ns, &subject).await) });

        let mut failures = 0;
        for (namespace, outcome) in join_all(deletes).await {
            if let Err(e) = outcome {
                failures += 1;
                warn!(user_id = %user_id, namespace = %namespace, "Cache invalidation failed: {e}");
            }
        }
        failures
    }

    /// Current skills. A miss reloads them from the profile store; if that
    /// fails too the result is empty.
    pub async fn skills(&self, user_id: Uuid) -> Vec<SkillRecord> {
        if let Some(skills) = self.get(Namespace::Skills, &user_id.to_string(), None).await {
            return skills;
        }
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;
        match self.load_skills(user_id).await {
            Ok(skills) => skills,
            Err(e) => {
                warn!(user_id = %user_id, "Failed to reload skills: {e}");
                Vec::new()
            }
        }
    }

    /// Cached dashboard, rebuilt from the latest stored analysis on a miss.
    /// `None` means the user has never completed an analysis.
    pub async fn dashboard(&self, user_id: Uuid) -> Result<Option<DashboardView>, AppError> {
        let subject = user_id.to_string();
        if let Some(view) = self.get(Namespace::Dashboard, &subject, None).await {
            return Ok(Some(view));
        }

        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;
        if let Some(view) = self.get(Namespace::Dashboard, &subject, None).await {
            return Ok(Some(view));
        }
        let Some(record) = self.profiles.latest_analysis(user_id).await? else {
            return Ok(None);
        };
        let analysis: AnalysisResult = serde_json::from_value(record.result).map_err(|e| {
            AppError::Internal(anyhow!("Stored analysis {} is unreadable: {e}", record.job_id))
        })?;

        let view = DashboardView {
            score: analysis.score,
            skills: self.load_skills(user_id).await?,
            analysis,
            updated_at: record.created_at,
        };
        debug!(
            user_id = %user_id,
            job_id = %record.job_id,
            "Dashboard rebuilt from stored analysis"
        );
        self.refill(Namespace::Dashboard, &subject, &view).await;
        Ok(Some(view))
    }

    /// Merges `incoming` into the cached skills, keeping accumulated
    /// `progress`/`last_practiced` for skills matched by name.
    pub async fn set_skill_progress(
        &self,
        user_id: Uuid,
        incoming: Vec<SkillRecord>,
    ) -> Result<Vec<SkillRecord>, AppError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let merged = merge_skills(&self.load_skills(user_id).await?, incoming);
        self.store_skills(user_id, &merged).await?;
        Ok(merged)
    }

    /// Adds `delta` to one skill's progress (clamped to 0–100) and stamps it as practiced now.
    pub async fn update_skill_progress(
        &self,
        user_id: Uuid,
        skill_name: &str,
        delta: i32,
    ) -> Result<Vec<SkillRecord>, AppError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let mut skills = self.load_skills(user_id).await?;
        let skill = skills
            .iter_mut()
            .find(|s| s.name.eq_ignore_ascii_case(skill_name))
            .ok_or_else(|| AppError::NotFound(format!("Skill '{skill_name}' not found")))?;

        skill.progress = (i32::from(skill.progress) + delta).clamp(0, 100) as u8;
        skill.last_practiced = Some(Utc::now());

        self.store_skills(user_id, &skills).await?;
        Ok(skills)
    }

    /// Publishes a fresh analysis: merges and persists skills, drops every
    /// per-user view (recommendations and article rankings depend on the old
    /// skill gaps), then writes the new skills and dashboard.
    pub async fn publish_analysis(
        &self,
        user_id: Uuid,
        analysis: &AnalysisResult,
        incoming: Vec<SkillRecord>,
    ) -> Result<DashboardView, AppError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;
        let subject = user_id.to_string();

        let merged = merge_skills(&self.load_skills(user_id).await?, incoming);
        self.persist_skills(user_id, &merged).await?;
        self.invalidate_all(user_id).await;

        let dashboard = DashboardView {
            score: analysis.score,
            analysis: analysis.clone(),
            skills: merged.clone(),
            updated_at: Utc::now(),
        };
        self.set(Namespace::Skills, &subject, &merged, None).await?;
        self.set(Namespace::Dashboard, &subject, &dashboard, None)
            .await?;
        Ok(dashboard)
    }

    pub async fn store_job_outcome(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        outcome: &JobOutcome,
    ) -> Result<(), AppError> {
        self.set(
            Namespace::Resume,
            &user_id.to_string(),
            outcome,
            Some(&job_id.to_string()),
        )
        .await
    }

    pub async fn job_outcome(&self, user_id: Uuid, job_id: Uuid) -> Option<JobOutcome> {
        self.get(
            Namespace::Resume,
            &user_id.to_string(),
            Some(&job_id.to_string()),
        )
        .await
    }

    /// Drops expired store entries and the locks of users with no write in
    /// flight. Returns `(entries, locks)` removed.
    pub async fn purge(&self) -> (usize, usize) {
        let entries = match self.store.purge_expired().await {
            Ok(n) => n,
            Err(e) => {
                warn!(store = self.store.name(), "Cache purge failed: {e}");
                0
            }
        };
        let before = self.user_locks.len();
        self.user_locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        (entries, before - self.user_locks.len())
    }

    fn user_lock(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        self.user_locks.entry(user_id).or_default().clone()
    }

    /// Skills from the cache, else from the stored profile (written back to
    /// the cache). Caller holds the user lock.
    async fn load_skills(&self, user_id: Uuid) -> Result<Vec<SkillRecord>, AppError> {
        let subject = user_id.to_string();
        if let Some(skills) = self.get(Namespace::Skills, &subject, None).await {
            return Ok(skills);
        }
        let skills = self
            .profiles
            .profile(user_id)
            .await?
            .map(|profile| profile.skills)
            .unwrap_or_default();
        if !skills.is_empty() {
            debug!(user_id = %user_id, count = skills.len(), "Skills reloaded from profile store");
            self.refill(Namespace::Skills, &subject, &skills).await;
        }
        Ok(skills)
    }

    async fn persist_skills(&self, user_id: Uuid, skills: &[SkillRecord]) -> Result<(), AppError> {
        let update = ProfileUpdate {
            skills: Some(skills.to_vec()),
            ..ProfileUpdate::default()
        };
        self.profiles.update(user_id, update).await
    }

    /// Profile store first, so an expired cache entry never loses progress.
    async fn store_skills(&self, user_id: Uuid, skills: &[SkillRecord]) -> Result<(), AppError> {
        self.persist_skills(user_id, skills).await?;
        self.set(Namespace::Skills, &user_id.to_string(), skills, None)
            .await
    }

    /// Write-back after a rebuild. The caller already has the value, so a
    /// failed write only costs the next reader another rebuild.
    async fn refill<T: Serialize + ?Sized>(&self, namespace: Namespace, subject: &str, value: &T) {
        if let Err(e) = self.set(namespace, subject, value, None).await {
            warn!(namespace = %namespace, subject, "Failed to refill cache entry: {e}");
        }
    }
}

/// Incoming records win on `level`/`target_level`/`category`; an existing
/// record with the same name contributes `progress` and `last_practiced`.
/// Skills absent from `incoming` are dropped.
pub fn merge_skills(existing: &[SkillRecord], incoming: Vec<SkillRecord>) -> Vec<SkillRecord> {
    incoming
        .into_iter()
        .map(|mut skill| {
            if let Some(prev) = existing
                .iter()
                .find(|e| e.name.eq_ignore_ascii_case(&skill.name))
            {
                skill.progress = prev.progress;
                skill.last_practiced = prev.last_practiced;
            }
            skill
        })
        .collect()
}
