//! Text extraction. Turns a stored upload into plain text.
//!
//! One decoder per accepted `DocumentType`, resolved in `decoder_for`. Decoding
//! runs on the blocking pool; a decoder panic surfaces as `AppError::Extraction`.
//! Extraction failures are structural and never retried.

mod docx;
mod pdf;

use std::path::Path;

use crate::errors::AppError;
use crate::models::job::DocumentType;

type Decoder = fn(&[u8]) -> Result<String, AppError>;

fn decoder_for(document_type: DocumentType) -> Decoder {
    match document_type {
        DocumentType::Pdf => pdf::extract_pdf_text,
        DocumentType::Docx => docx::extract_docx_text,
        DocumentType::PlainText => extract_plain_text,
    }
}

/// Extracts text from a file whose type was already resolved at intake.
pub async fn extract_document(
    path: &Path,
    document_type: DocumentType,
) -> Result<String, AppError> {
    let bytes = tokio::fs::read(path).await?;
    let decode = decoder_for(document_type);

    let text = tokio::task::spawn_blocking(move || decode(&bytes))
        .await
        .map_err(|e| AppError::Extraction(format!("{document_type} decoder aborted: {e}")))??;

    tracing::debug!(
        document_type = %document_type,
        chars = text.len(),
        "Extracted document text"
    );
    Ok(text)
}

fn extract_plain_text(bytes: &[u8]) -> Result<String, AppError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    Ok(String::from_utf8_lossy(bytes).into_owned())
}
