//! Temporary storage for uploaded documents.
//!
//! An upload lives exactly as long as its `UploadGuard`. The guard travels
//! with the job through retries and is dropped on the terminal transition,
//! which deletes the file. Files orphaned by a crash are swept at startup.

use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::models::job::DocumentType;

pub const UPLOAD_PREFIX: &str = "resume-";

#[derive(Debug)]
pub struct UploadGuard {
    file: NamedTempFile,
}

impl UploadGuard {
    /// Writes `bytes` to a fresh `resume-*` file inside `dir`.
    pub async fn create(
        dir: &Path,
        bytes: Bytes,
        document_type: DocumentType,
    ) -> Result<Self, AppError> {
        tokio::fs::create_dir_all(dir).await?;
        let dir = dir.to_path_buf();
        let suffix = format!(".{}", document_type.extension());

        let file = tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
            let mut file = tempfile::Builder::new()
                .prefix(UPLOAD_PREFIX)
                .suffix(&suffix)
                .tempfile_in(&dir)?;
            file.write_all(&bytes)?;
            file.flush()?;
            Ok(file)
        })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Upload write task failed: {e}")))??;

        debug!(path = %file.path().display(), "Upload stored");
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Deletes the file now, logging instead of failing if it is already gone.
    pub fn cleanup(self) {
        let path: PathBuf = self.file.path().to_path_buf();
        match self.file.close() {
            Ok(()) => debug!(path = %path.display(), "Upload removed"),
            Err(e) => warn!(path = %path.display(), "Failed to remove upload: {e}"),
        }
    }
}

/// Removes `resume-*` files left behind by a previous process.
/// Must run before the job queue starts accepting work.
pub async fn sweep_orphaned_uploads(dir: &Path) -> Result<usize, AppError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let is_upload = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(UPLOAD_PREFIX));
        if !is_upload || !entry.file_type().await?.is_file() {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => removed += 1,
            Err(e) => {
                warn!(path = %entry.path().display(), "Failed to remove orphaned upload: {e}")
            }
        }
    }

    if removed > 0 {
        info!(removed, dir = %dir.display(), "Swept orphaned uploads");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guard_deletes_file_on_cleanup_and_drop() {
        let dir = tempfile::tempdir().unwrap();

        let bytes = Bytes::from_static(b"hello");
        let guard = UploadGuard::create(dir.path(), bytes, DocumentType::PlainText)
            .await
            .unwrap();
        let path = guard.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
        assert!(path.extension().is_some_and(|e| e == "txt"));
        guard.cleanup();
        assert!(!path.exists());

        let guard = UploadGuard::create(dir.path(), Bytes::from_static(b"x"), DocumentType::Pdf)
            .await
            .unwrap();
        let path = guard.path().to_path_buf();
        drop(guard);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_sweep_only_touches_uploads() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("resume-abc.pdf"), b"orphan").unwrap();
        std::fs::write(dir.path().join("resume-def.txt"), b"orphan").unwrap();
        std::fs::write(dir.path().join("keep.txt"), b"keep").unwrap();

        assert_eq!(sweep_orphaned_uploads(dir.path()).await.unwrap(), 2);
        assert!(dir.path().join("keep.txt").exists());
        assert!(!dir.path().join("resume-abc.pdf").exists());
    }

    #[tokio::test]
    async fn test_sweep_of_missing_dir_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(sweep_orphaned_uploads(&dir.path().join("absent")).await.unwrap(), 0);
    }
}
