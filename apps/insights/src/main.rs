mod analysis;
mod cache;
mod config;
mod content;
mod errors;
mod extraction;
mod inference;
mod jobs;
mod models;
mod persistence;
mod routes;
mod scoring;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cache::{CacheLayer, CacheStore, InMemoryStore, RedisStore};
use crate::config::Config;
use crate::content::{ArticleSource, ContentPrioritizer, DevToSource, HashnodeSource};
use crate::errors::AppError;
use crate::inference::InferenceClient;
use crate::jobs::{spawn_scheduler, sweep_orphaned_uploads, AnalysisPipeline, JobQueue, Maintenance};
use crate::persistence::{InMemoryResumeStore, PgResumeStore, ResumeStore};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Insights API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL, or the in-memory store for local runs
    let store: Arc<dyn ResumeStore> = match &config.database_url {
        Some(url) => Arc::new(PgResumeStore::connect(url).await?),
        None => {
            warn!("DATABASE_URL not set; analyses will not outlive the process");
            Arc::new(InMemoryResumeStore::new())
        }
    };

    // Initialize cache: Redis when configured, otherwise process-local
    let cache_store: Arc<dyn CacheStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisStore::connect(url).await?),
        None => Arc::new(InMemoryStore::new()),
    };
    info!("Cache store initialized ({})", cache_store.name());
    let cache = CacheLayer::new(cache_store, Arc::clone(&store));

    // Initialize inference client
    let inference = InferenceClient::new(
        config.inference_api_url.clone(),
        config.inference_api_key.clone(),
        config.ner_model.clone(),
        config.sentiment_model.clone(),
    )
    .map_err(AppError::from)?;
    info!(
        "Inference client initialized (ner: {}, sentiment: {})",
        config.ner_model, config.sentiment_model
    );

    // Content sources feeding recommendations
    let sources: Vec<Arc<dyn ArticleSource>> = vec![
        Arc::new(DevToSource::new(&config.devto_api_url)?) as Arc<dyn ArticleSource>,
        Arc::new(HashnodeSource::new(&config.hashnode_api_url)?) as Arc<dyn ArticleSource>,
    ];
    let prioritizer = ContentPrioritizer::new(cache.clone(), sources);

    // Uploads left by a crashed process are never going to be processed
    let swept = sweep_orphaned_uploads(&config.upload_dir).await?;
    info!("Upload dir {} ready ({swept} orphans removed)", config.upload_dir.display());

    // Job queue + maintenance scheduler
    let pipeline = AnalysisPipeline::new(Arc::new(inference), cache.clone(), Arc::clone(&store));
    let maintenance = Maintenance::new(cache.clone(), prioritizer.clone(), store);
    let queue = JobQueue::start(
        config.pipeline(),
        cache.clone(),
        Arc::new(pipeline),
        Arc::new(maintenance),
    );
    let _schedules = spawn_scheduler(queue.clone());

    // Build app state
    let state = AppState {
        cache,
        queue,
        prioritizer,
        upload_dir: Arc::new(config.upload_dir.clone()),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
