//! Bounded, retrying job queue.
//!
//! Submissions go into an unbounded FIFO channel. A single dispatcher task
//! takes one semaphore permit per job before spawning it, so at most
//! `concurrency` jobs run at once and the rest wait in submission order.
//! A failed attempt that may be retried sleeps out its backoff on its own
//! task, without a permit, and is then re-enqueued at the back of the line.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cache::CacheLayer;
use crate::config::PipelineConfig;
use crate::errors::AppError;
use crate::jobs::pipeline::JobProcessor;
use crate::jobs::scheduler::{MaintenanceHandler, MaintenanceTask};
use crate::jobs::uploads::UploadGuard;
use crate::models::job::{AnalysisJob, DocumentType, JobOutcome, JobStatus};

/// Terminal jobs stay queryable in the registry this long.
pub const JOB_RETENTION: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queued: u64,
    pub running: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub retried: u64,
}

#[derive(Debug, Default)]
struct Counters {
    succeeded: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
}

enum Work {
    Analysis { job_id: Uuid, upload: UploadGuard },
    Maintenance { task: MaintenanceTask, attempts: u32 },
}

struct Inner {
    tx: mpsc::UnboundedSender<Work>,
    jobs: DashMap<Uuid, AnalysisJob>,
    counters: Counters,
    config: PipelineConfig,
    cache: CacheLayer,
    processor: Arc<dyn JobProcessor>,
    maintenance: Arc<dyn MaintenanceHandler>,
}

#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

impl JobQueue {
    /// Builds the queue and spawns its dispatcher on the current runtime.
    pub fn start(
        config: PipelineConfig,
        cache: CacheLayer,
        processor: Arc<dyn JobProcessor>,
        maintenance: Arc<dyn MaintenanceHandler>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            tx,
            jobs: DashMap::new(),
            counters: Counters::default(),
            config,
            cache,
            processor,
            maintenance,
        });

        info!(
            concurrency = inner.config.concurrency,
            max_attempts = inner.config.max_attempts,
            "Job queue started"
        );
        tokio::spawn(Arc::clone(&inner).dispatch(rx));
        Self { inner }
    }

    /// Registers an analysis job for `upload` and queues it. The upload is
    /// deleted when the job reaches a terminal state.
    pub fn submit(
        &self,
        user_id: Uuid,
        upload: UploadGuard,
        document_type: DocumentType,
    ) -> Result<Uuid, AppError> {
        let job = AnalysisJob::new(user_id, upload.path().to_path_buf(), document_type);
        let job_id = job.id;
        self.inner.jobs.insert(job_id, job);

        if self
            .inner
            .tx
            .send(Work::Analysis { job_id, upload })
            .is_err()
        {
            self.inner.jobs.remove(&job_id);
            return Err(AppError::Internal(anyhow::anyhow!("Job queue is not running")));
        }
        info!(job_id = %job_id, user_id = %user_id, document_type = %document_type, "Job queued");
        Ok(job_id)
    }

    pub fn submit_maintenance(&self, task: MaintenanceTask) -> Result<(), AppError> {
        self.inner
            .tx
            .send(Work::Maintenance { task, attempts: 0 })
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Job queue is not running")))
    }

    pub fn status(&self, job_id: Uuid) -> Option<AnalysisJob> {
        self.inner.jobs.get(&job_id).map(|job| job.clone())
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            succeeded: self.inner.counters.succeeded.load(Ordering::Relaxed),
            failed: self.inner.counters.failed.load(Ordering::Relaxed),
            retried: self.inner.counters.retried.load(Ordering::Relaxed),
            ..QueueStats::default()
        };
        for job in self.inner.jobs.iter() {
            match job.status {
                JobStatus::Queued => stats.queued += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Succeeded | JobStatus::Failed => {}
            }
        }
        stats
    }

    /// Drops terminal jobs that finished more than `retention` ago.
    pub fn prune_finished(&self, retention: Duration) -> usize {
        self.inner.prune_finished(retention)
    }
}

impl Inner {
    async fn dispatch(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<Work>) {
        let permits = Arc::new(Semaphore::new(self.config.concurrency));
        while let Some(work) = rx.recv().await {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let inner = Arc::clone(&self);
            tokio::spawn(async move {
                let _permit = permit;
                match work {
                    Work::Analysis { job_id, upload } => inner.run_analysis(job_id, upload).await,
                    Work::Maintenance { task, attempts } => {
                        inner.run_maintenance(task, attempts).await
                    }
                }
            });
        }
    }

    async fn run_analysis(self: Arc<Self>, job_id: Uuid, upload: UploadGuard) {
        let Some(job) = self.mark_running(job_id) else {
            warn!(job_id = %job_id, "Dequeued job is no longer registered");
            upload.cleanup();
            return;
        };

        match self.processor.process(&job).await {
            Ok(result) => {
                let outcome = JobOutcome::succeeded(result);
                self.finish(&job, JobStatus::Succeeded, None, &outcome).await;
                self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
                info!(job_id = %job_id, attempts = job.attempts, "Job succeeded");
                upload.cleanup();
            }
            Err(e) if e.is_retryable() && job.attempts < self.config.max_attempts => {
                let delay = backoff_delay(self.config.backoff_base, job.attempts);
                warn!(
                    job_id = %job_id,
                    attempt = job.attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    "Job attempt failed: {e}"
                );
                self.mark_retrying(job_id, e.to_string());
                self.counters.retried.fetch_add(1, Ordering::Relaxed);
                self.requeue_after(delay, Work::Analysis { job_id, upload });
            }
            Err(e) => {
                let message = failure_message(job.attempts, &e);
                error!(job_id = %job_id, user_id = %job.user_id, "{message}");
                let outcome = JobOutcome::failed(message.clone());
                self.finish(&job, JobStatus::Failed, Some(message), &outcome)
                    .await;
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                upload.cleanup();
            }
        }
    }

    async fn run_maintenance(self: Arc<Self>, task: MaintenanceTask, attempts: u32) {
        let attempts = attempts + 1;
        let outcome = match task {
            MaintenanceTask::PruneJobs => {
                let pruned = self.prune_finished(JOB_RETENTION);
                let (entries, locks) = self.cache.purge().await;
                info!(pruned, entries, locks, "Pruned finished jobs and idle cache state");
                Ok(())
            }
            _ => self.maintenance.run(task).await,
        };

        match outcome {
            Ok(()) => info!(task = %task, attempts, "Maintenance task finished"),
            Err(e) if e.is_retryable() && attempts < self.config.maintenance_max_attempts => {
                let delay = backoff_delay(self.config.backoff_base, attempts);
                warn!(task = %task, attempt = attempts, "Maintenance task failed, retrying: {e}");
                self.requeue_after(delay, Work::Maintenance { task, attempts });
            }
            Err(e) => error!(task = %task, attempts, "Maintenance task failed permanently: {e}"),
        }
    }

    fn requeue_after(self: &Arc<Self>, delay: Duration, work: Work) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(mpsc::error::SendError(work)) = inner.tx.send(work) {
                warn!("Job queue closed before a retry could be enqueued");
                if let Work::Analysis { upload, .. } = work {
                    upload.cleanup();
                }
            }
        });
    }

    /// Running + one more attempt. Returns the updated snapshot.
    fn mark_running(&self, job_id: Uuid) -> Option<AnalysisJob> {
        let mut job = self.jobs.get_mut(&job_id)?;
        job.status = JobStatus::Running;
        job.attempts += 1;
        Some(job.clone())
    }

    fn mark_retrying(&self, job_id: Uuid, error: String) {
        if let Some(mut job) = self.jobs.get_mut(&job_id) {
            job.status = JobStatus::Queued;
            job.last_error = Some(error);
        }
    }

    /// Writes the terminal payload pollers read, then the terminal status.
    async fn finish(
        &self,
        job: &AnalysisJob,
        status: JobStatus,
        error: Option<String>,
        outcome: &JobOutcome,
    ) {
        if let Err(e) = self
            .cache
            .store_job_outcome(job.user_id, job.id, outcome)
            .await
        {
            warn!(job_id = %job.id, "Failed to cache job outcome: {e}");
        }
        if let Some(mut entry) = self.jobs.get_mut(&job.id) {
            entry.status = status;
            if error.is_some() {
                entry.last_error = error;
            }
            entry.finished_at = Some(Utc::now());
        }
    }

    fn prune_finished(&self, retention: Duration) -> usize {
        let Ok(retention) = chrono::Duration::from_std(retention) else {
            return 0;
        };
        let cutoff = Utc::now() - retention;
        let before = self.jobs.len();
        self.jobs.retain(|_, job| {
            !(job.status.is_terminal() && job.finished_at.is_some_and(|at| at <= cutoff))
        });
        before - self.jobs.len()
    }
}

/// `base * 2^(attempt-1)` for the retry after `attempt` failed attempts.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
}

fn failure_message(attempts: u32, error: &AppError) -> String {
    let plural = if attempts == 1 { "" } else { "s" };
    format!("analysis failed after {attempts} attempt{plural}: {error}")
}
