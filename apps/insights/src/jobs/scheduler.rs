//! Periodic maintenance jobs, enqueued on fixed intervals through the job queue.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::cache::CacheLayer;
use crate::content::{top_gaps, ContentPrioritizer};
use crate::errors::AppError;
use crate::jobs::queue::JobQueue;
use crate::models::skill::SkillRecord;
use crate::persistence::{ProfileUpdate, ResumeStore, WeeklySummary};

const HOUR: Duration = Duration::from_secs(60 * 60);
const SUMMARY_GAPS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceTask {
    /// Re-rank content for every active user with skills.
    DailyContentRefresh,
    /// Persist a per-user progress roll-up.
    WeeklySummary,
    /// Drop terminal jobs past the retention window from the registry, plus
    /// expired cache entries and idle per-user locks.
    PruneJobs,
}

impl MaintenanceTask {
    pub const ALL: [MaintenanceTask; 3] = [
        MaintenanceTask::DailyContentRefresh,
        MaintenanceTask::WeeklySummary,
        MaintenanceTask::PruneJobs,
    ];

    pub fn interval(&self) -> Duration {
        match self {
            MaintenanceTask::DailyContentRefresh => 24 * HOUR,
            MaintenanceTask::WeeklySummary => 7 * 24 * HOUR,
            MaintenanceTask::PruneJobs => HOUR,
        }
    }
}

impl fmt::Display for MaintenanceTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MaintenanceTask::DailyContentRefresh => "daily_content_refresh",
            MaintenanceTask::WeeklySummary => "weekly_summary",
            MaintenanceTask::PruneJobs => "prune_jobs",
        })
    }
}

/// Runs the maintenance tasks that touch user data. `PruneJobs` is handled
/// by the queue itself.
#[async_trait]
pub trait MaintenanceHandler: Send + Sync {
    async fn run(&self, task: MaintenanceTask) -> Result<(), AppError>;
}

pub struct Maintenance {
    cache: CacheLayer,
    prioritizer: ContentPrioritizer,
    store: Arc<dyn ResumeStore>,
}

impl Maintenance {
    pub fn new(
        cache: CacheLayer,
        prioritizer: ContentPrioritizer,
        store: Arc<dyn ResumeStore>,
    ) -> Self {
        Self {
            cache,
            prioritizer,
            store,
        }
    }

    async fn refresh_content(&self) -> Result<(), AppError> {
        let mut refreshed = 0;
        for user_id in self.store.active_users().await? {
            let skills = self.cache.skills(user_id).await;
            if skills.is_empty() {
                continue;
            }
            match self.prioritizer.refresh(user_id, &skills).await {
                Ok(_) => refreshed += 1,
                Err(e) => warn!(user_id = %user_id, "Content refresh failed: {e}"),
            }
        }
        info!(refreshed, "Daily content refresh finished");
        Ok(())
    }

    async fn write_summaries(&self) -> Result<(), AppError> {
        let mut written = 0;
        for user_id in self.store.active_users().await? {
            let skills = self.cache.skills(user_id).await;
            if skills.is_empty() {
                continue;
            }
            let update = ProfileUpdate {
                weekly_summary: Some(weekly_summary(&skills)),
                ..ProfileUpdate::default()
            };
            match self.store.update(user_id, update).await {
                Ok(()) => written += 1,
                Err(e) => warn!(user_id = %user_id, "Weekly summary failed: {e}"),
            }
        }
        info!(written, "Weekly summaries written");
        Ok(())
    }
}

#[async_trait]
impl MaintenanceHandler for Maintenance {
    async fn run(&self, task: MaintenanceTask) -> Result<(), AppError> {
        match task {
            MaintenanceTask::DailyContentRefresh => self.refresh_content().await,
            MaintenanceTask::WeeklySummary => self.write_summaries().await,
            MaintenanceTask::PruneJobs => Ok(()),
        }
    }
}

pub fn weekly_summary(skills: &[SkillRecord]) -> WeeklySummary {
    let average_progress = if skills.is_empty() {
        0.0
    } else {
        let total: f64 = skills.iter().map(|s| f64::from(s.progress)).sum();
        (total / skills.len() as f64 * 100.0).round() / 100.0
    };
    WeeklySummary {
        skill_count: skills.len(),
        average_progress,
        top_gaps: top_gaps(skills, SUMMARY_GAPS)
            .into_iter()
            .map(|s| s.name.clone())
            .collect(),
        generated_at: Utc::now(),
    }
}

/// One interval loop per task. The first tick fires one full interval after
/// start so a restart loop does not re-run every task.
pub fn spawn_scheduler(queue: JobQueue) -> Vec<JoinHandle<()>> {
    MaintenanceTask::ALL
        .into_iter()
        .map(|task| {
            let queue = queue.clone();
            tokio::spawn(async move {
                let period = task.interval();
                let start = tokio::time::Instant::now() + period;
                let mut ticker = tokio::time::interval_at(start, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    if let Err(e) = queue.submit_maintenance(task) {
                        warn!(task = %task, "Failed to enqueue maintenance task: {e}");
                    }
                }
            })
        })
        .collect()
}
