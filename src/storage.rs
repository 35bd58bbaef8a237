//! # Temporary Storage Manager
//!
//! Owns the upload and processed directories for the audio pipeline.
//! Directories are created lazily on first use, file names are generated
//! collision-free across concurrent requests, and the processed output path
//! is always derivable from the input's stored name.
//!
//! ## Key Responsibilities:
//! - **Directory lifecycle**: `create_dir_all` on demand, idempotent
//! - **Name allocation**: UUID v4 token plus the sanitized original extension
//! - **Path derivation**: `instrumental_<stored name>` under the processed dir

use crate::config::StorageConfig;
use crate::error::{AppError, AppResult};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Prefix applied to a stored upload name to derive its processed output name.
pub const OUTPUT_PREFIX: &str = "instrumental_";

/// An accepted upload persisted to temporary storage.
///
/// Owned exclusively by the request that created it; the cleanup queue
/// removes the file a fixed delay after delivery or failure.
#[derive(Debug, Clone)]
pub struct UploadedArtifact {
    /// Generated unique file name (UUID + original extension)
    pub stored_name: String,
    /// File name as submitted by the client
    pub original_name: String,
    /// Absolute or working-root-relative location on disk
    pub path: PathBuf,
    /// Content type declared in the multipart field
    pub media_type: String,
    /// Bytes written to storage
    pub size: u64,
}

/// Manages the upload and processed directories from an explicit config.
#[derive(Debug, Clone)]
pub struct StorageManager {
    config: StorageConfig,
}

impl StorageManager {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Create the upload directory tree if absent. Idempotent.
    ///
    /// Fails only on unrecoverable filesystem errors (permissions, disk
    /// full), surfaced as `AppError::Storage`.
    pub async fn ensure_upload_dir(&self) -> AppResult<()> {
        ensure_dir(Path::new(&self.config.upload_dir)).await
    }

    /// Create the processed directory tree if absent. Idempotent.
    pub async fn ensure_processed_dir(&self) -> AppResult<()> {
        ensure_dir(Path::new(&self.config.processed_dir)).await
    }

    /// Allocate a collision-resistant storage name preserving the original
    /// file's extension.
    ///
    /// ## Name shape:
    /// `550e8400-e29b-41d4-a716-446655440000.mp3` - a UUID v4 token plus the
    /// extension of the submitted name. The extension is externally
    /// influenced, so it is reduced to lowercase ASCII alphanumerics and
    /// capped at 8 characters; everything else about the client name is
    /// discarded.
    pub fn allocate_name(&self, original_name: &str) -> String {
        let token = Uuid::new_v4();
        match sanitized_extension(original_name) {
            Some(ext) => format!("{}.{}", token, ext),
            None => token.to_string(),
        }
    }

    /// Location of a stored upload within the upload directory.
    pub fn upload_path(&self, stored_name: &str) -> PathBuf {
        Path::new(&self.config.upload_dir).join(stored_name)
    }

    /// Derive the processed output path for a stored upload name.
    ///
    /// The derivation is deterministic: output existence implies a specific
    /// upload existed.
    pub fn output_path_for(&self, stored_name: &str) -> PathBuf {
        Path::new(&self.config.processed_dir).join(format!("{}{}", OUTPUT_PREFIX, stored_name))
    }
}

async fn ensure_dir(dir: &Path) -> AppResult<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::Storage(format!("failed to create {}: {}", dir.display(), e)))
}

/// Extract a storage-safe extension from a client-supplied file name.
fn sanitized_extension(original_name: &str) -> Option<String> {
    let ext: String = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())?
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_ascii_lowercase();
    if ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;

    fn manager(root: &Path) -> StorageManager {
        StorageManager::new(StorageConfig {
            upload_dir: root.join("uploads").to_string_lossy().into_owned(),
            processed_dir: root.join("processed").to_string_lossy().into_owned(),
            cleanup_delay_secs: 60,
        })
    }

    #[test]
    fn test_allocate_name_preserves_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = manager(tmp.path());

        let name = storage.allocate_name("My Song.MP3");
        assert!(name.ends_with(".mp3"), "got {}", name);

        // No extension at all is acceptable
        let bare = storage.allocate_name("recording");
        assert!(!bare.contains('.'), "got {}", bare);

        // Hostile extensions are reduced to alphanumerics
        let odd = storage.allocate_name("x.mp3\"; rm -rf");
        let ext = odd.rsplit('.').next().unwrap();
        assert!(ext.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_allocate_name_is_unique() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = manager(tmp.path());
        let a = storage.allocate_name("track.wav");
        let b = storage.allocate_name("track.wav");
        assert_ne!(a, b);
    }

    #[test]
    fn test_output_path_derivation() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = manager(tmp.path());
        let out = storage.output_path_for("abc.wav");
        assert!(out.ends_with(Path::new("processed").join("instrumental_abc.wav")));
    }

    #[tokio::test]
    async fn test_ensure_dirs_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = manager(tmp.path());
        storage.ensure_upload_dir().await.unwrap();
        storage.ensure_upload_dir().await.unwrap();  // second call must not fail
        storage.ensure_processed_dir().await.unwrap();
        assert!(tmp.path().join("uploads").is_dir());
        assert!(tmp.path().join("processed").is_dir());
    }
}
