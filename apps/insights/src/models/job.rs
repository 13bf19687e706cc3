use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::AnalysisResult;

/// Document formats accepted at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Pdf,
    Docx,
    PlainText,
}

impl DocumentType {
    /// Resolves a declared mime type. Parameters such as `; charset=utf-8` are ignored.
    pub fn from_mime(mime: &str) -> Result<Self, AppError> {
        let essence = mime.split(';').next().unwrap_or_default().trim().to_lowercase();
        match essence.as_str() {
            "application/pdf" => Ok(DocumentType::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Ok(DocumentType::Docx)
            }
            "text/plain" => Ok(DocumentType::PlainText),
            _ => Err(AppError::UnsupportedFormat(mime.to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Docx => "docx",
            DocumentType::PlainText => "txt",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Docx => "docx",
            DocumentType::PlainText => "plain_text",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// One resume analysis request, owned by the job queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisJob {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_path: PathBuf,
    pub document_type: DocumentType,
    pub submitted_at: DateTime<Utc>,
    pub status: JobStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl AnalysisJob {
    pub fn new(user_id: Uuid, document_path: PathBuf, document_type: DocumentType) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            document_path,
            document_type,
            submitted_at: Utc::now(),
            status: JobStatus::Queued,
            attempts: 0,
            last_error: None,
            finished_at: None,
        }
    }
}

/// Terminal payload cached under `resume:{user_id}:{job_id}` for pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl JobOutcome {
    pub fn succeeded(result: AnalysisResult) -> Self {
        Self {
            status: JobStatus::Succeeded,
            result: Some(result),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            result: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_mime_accepts_supported_types() {
        assert_eq!(DocumentType::from_mime("application/pdf").unwrap(), DocumentType::Pdf);
        assert_eq!(
            DocumentType::from_mime(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            )
            .unwrap(),
            DocumentType::Docx
        );
        assert_eq!(
            DocumentType::from_mime("text/plain; charset=utf-8").unwrap(),
            DocumentType::PlainText
        );
    }

    #[test]
    fn test_from_mime_rejects_everything_else() {
        for mime in ["image/png", "application/msword", "text/html", ""] {
            assert!(matches!(
                DocumentType::from_mime(mime),
                Err(AppError::UnsupportedFormat(_))
            ));
        }
    }

    #[test]
    fn test_failed_outcome_serializes_without_result() {
        let value = serde_json::to_value(JobOutcome::failed("boom")).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"], "boom");
        assert!(value.get("result").is_none());
    }
}
