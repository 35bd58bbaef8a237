//! # Upload Intake
//!
//! Validates and persists one incoming multipart file stream per request.
//! Rejections happen before (or by discarding) anything durable: a bad
//! content type is refused before the first byte is written, and a stream
//! that blows the size limit has its partial file removed before the error
//! is returned.
//!
//! ## Validation Order:
//! 1. Locate the `audioFile` field (anything else is skipped) - else
//!    `NoFilePresent`
//! 2. Declared content type must begin with `audio/` - else
//!    `UnsupportedMediaType`
//! 3. Streamed bytes stay within the configured limit - else
//!    `PayloadTooLarge`

use crate::error::{AppError, AppResult};
use crate::storage::{StorageManager, UploadedArtifact};
use actix_multipart::{Field, Multipart};
use futures_util::TryStreamExt;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Multipart field name the API contract expects the file under.
pub const UPLOAD_FIELD: &str = "audioFile";

/// Receive, validate, and persist the uploaded audio file.
///
/// On success the returned [`UploadedArtifact`] describes the stored file;
/// the caller owns its lifecycle from here (processing and cleanup
/// scheduling). On any rejection nothing of the upload remains on disk.
pub async fn receive(
    mut payload: Multipart,
    storage: &StorageManager,
    max_bytes: u64,
) -> AppResult<UploadedArtifact> {
    while let Some(field) = payload
        .try_next()
        .await
        .map_err(|e| {
            debug!(error = %e, "multipart stream rejected");
            AppError::NoFilePresent
        })?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            // Unrelated form fields are drained and ignored
            continue;
        }
        return persist_field(field, storage, max_bytes).await;
    }

    Err(AppError::NoFilePresent)
}

/// Validate the field's declared type, then stream it to the upload dir.
async fn persist_field(
    mut field: Field,
    storage: &StorageManager,
    max_bytes: u64,
) -> AppResult<UploadedArtifact> {
    // Content-type filter runs before any byte is persisted
    let media_type = match field.content_type() {
        Some(mime) if mime.type_().as_str() == "audio" => mime.essence_str().to_string(),
        Some(mime) => return Err(AppError::UnsupportedMediaType(mime.essence_str().to_string())),
        None => return Err(AppError::UnsupportedMediaType("not declared".to_string())),
    };

    let original_name = field
        .content_disposition()
        .and_then(|cd| cd.get_filename())
        .unwrap_or("upload")
        .to_string();

    storage.ensure_upload_dir().await?;
    let stored_name = storage.allocate_name(&original_name);
    let path = storage.upload_path(&stored_name);

    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(|e| AppError::Storage(format!("failed to create {}: {}", path.display(), e)))?;

    let mut written: u64 = 0;
    loop {
        let chunk = match field.try_next().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                discard(&path).await;
                return Err(AppError::Internal(format!("upload stream aborted: {}", e)));
            }
        };

        written += chunk.len() as u64;
        if written > max_bytes {
            discard(&path).await;
            return Err(AppError::PayloadTooLarge(max_bytes));
        }

        if let Err(e) = file.write_all(&chunk).await {
            discard(&path).await;
            return Err(AppError::Storage(format!("failed to write upload: {}", e)));
        }
    }

    if let Err(e) = file.flush().await {
        discard(&path).await;
        return Err(AppError::Storage(format!("failed to flush upload: {}", e)));
    }

    info!(
        original = %original_name,
        stored = %stored_name,
        media_type = %media_type,
        size_bytes = written,
        "upload accepted"
    );

    Ok(UploadedArtifact {
        stored_name,
        original_name,
        path,
        media_type,
        size: written,
    })
}

/// Remove a partially written upload. Missing files are fine.
async fn discard(path: &Path) {
    let _ = tokio::fs::remove_file(path).await;
}
