use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::article::RankedArticle;
use crate::models::resume::DashboardView;
use crate::models::skill::SkillRecord;
use crate::routes::resumes::UserIdQuery;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ProgressRequest {
    pub user_id: Uuid,
    pub delta: i32,
}

/// GET /api/v1/dashboard
pub async fn handle_dashboard(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<DashboardView>, AppError> {
    state
        .cache
        .dashboard(params.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No analysis yet for user {}", params.user_id)))
}

/// GET /api/v1/recommendations
pub async fn handle_recommendations(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Json<Vec<RankedArticle>> {
    let skills = state.cache.skills(params.user_id).await;
    Json(state.prioritizer.rank(params.user_id, &skills).await)
}

/// PATCH /api/v1/skills/:name/progress
pub async fn handle_skill_progress(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<ProgressRequest>,
) -> Result<Json<Vec<SkillRecord>>, AppError> {
    let skills = state
        .cache
        .update_skill_progress(req.user_id, &name, req.delta)
        .await?;
    Ok(Json(skills))
}
