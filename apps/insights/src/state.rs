use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::CacheLayer;
use crate::content::ContentPrioritizer;
use crate::jobs::JobQueue;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub cache: CacheLayer,
    pub queue: JobQueue,
    pub prioritizer: ContentPrioritizer,
    /// Where intake writes uploads before queuing them.
    pub upload_dir: Arc<PathBuf>,
}
