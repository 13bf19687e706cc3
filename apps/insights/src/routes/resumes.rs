use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::jobs::UploadGuard;
use crate::models::job::{DocumentType, JobOutcome};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
}

/// POST /api/v1/resumes
/// Multipart form with `user_id` and `file`. The file's declared content type
/// decides the decoder; unsupported types are rejected before queuing.
pub async fn handle_submit(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let mut user_id: Option<Uuid> = None;
    let mut file: Option<(String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "user_id" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;
                let id = raw
                    .trim()
                    .parse()
                    .map_err(|_| AppError::Validation(format!("Invalid user_id '{raw}'")))?;
                user_id = Some(id);
            }
            "file" => {
                let mime = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;
                file = Some((mime, bytes));
            }
            _ => {}
        }
    }

    let user_id = user_id.ok_or_else(|| AppError::Validation("user_id is required".to_string()))?;
    let (mime, bytes) = file.ok_or_else(|| AppError::Validation("file is required".to_string()))?;
    let document_type = DocumentType::from_mime(&mime)?;
    if bytes.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }

    let upload = UploadGuard::create(&state.upload_dir, bytes, document_type).await?;
    let job_id = state.queue.submit(user_id, upload, document_type)?;
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { job_id })))
}

/// GET /api/v1/resumes/jobs/:job_id
/// Terminal payload once the job has finished; 404 until then.
pub async fn handle_job_result(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<JobOutcome>, AppError> {
    if let Some(outcome) = state.cache.job_outcome(params.user_id, job_id).await {
        return Ok(Json(outcome));
    }
    let message = match state.queue.status(job_id) {
        Some(job) if job.user_id == params.user_id && !job.status.is_terminal() => {
            format!("Job {job_id} has not finished (attempt {})", job.attempts.max(1))
        }
        _ => format!("No result for job {job_id}"),
    };
    Err(AppError::NotFound(message))
}
