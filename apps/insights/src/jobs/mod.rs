//! Asynchronous analysis jobs: intake, bounded execution, retries and maintenance.

pub mod pipeline;
pub mod queue;
pub mod scheduler;
pub mod uploads;

pub use pipeline::{AnalysisPipeline, JobProcessor};
pub use queue::{JobQueue, QueueStats};
pub use scheduler::{spawn_scheduler, Maintenance, MaintenanceHandler, MaintenanceTask};
pub use uploads::{sweep_orphaned_uploads, UploadGuard};
