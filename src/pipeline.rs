//! # Processing Orchestrator
//!
//! Sequences one request through intake, external invocation, and delivery
//! preparation, with failure exits at every stage:
//!
//! ```text
//! Received -> Validated -> Invoked -> Delivered -> CleanupScheduled
//!      \           \           \
//!       +-----------+-----------+--> Failed(reason)
//! ```
//!
//! Whatever the outcome, every artifact written to storage before the
//! failure is scheduled for deferred cleanup exactly once, so storage
//! never grows unbounded even under repeated mid-pipeline failures.
//! The pipeline is strictly single-attempt: no stage is ever retried.

use crate::error::AppResult;
use crate::intake;
use crate::state::AppState;
use crate::storage::OUTPUT_PREFIX;
use actix_multipart::Multipart;
use std::path::PathBuf;
use tracing::{info, warn};

/// A processed artifact ready to stream back to the caller.
pub struct ProcessedDelivery {
    /// Location of the instrumental output on disk
    pub path: PathBuf,
    /// Download name derived from the original upload's filename
    pub download_name: String,
    /// Content type declared on the upload, reused for the response
    pub media_type: String,
}

/// Run one upload through the full pipeline.
///
/// ## Stage-by-stage failure behavior:
/// - Intake errors short-circuit before the external tool runs; intake has
///   already discarded any partial file.
/// - Invocation errors still schedule the accepted upload (and the possibly
///   half-written output) for cleanup.
/// - On success both artifacts are scheduled before the delivery descriptor
///   is returned, so cleanup never depends on the response actually being
///   read by the client.
pub async fn process_upload(state: &AppState, payload: Multipart) -> AppResult<ProcessedDelivery> {
    let config = state.get_config();

    // Received -> Validated
    let artifact = intake::receive(payload, &state.storage, config.processing.max_upload_bytes).await?;

    // Validated -> Invoked
    if let Err(e) = state.storage.ensure_processed_dir().await {
        state.cleanup.schedule(artifact.path.clone());
        return Err(e);
    }

    let output = state.storage.output_path_for(&artifact.stored_name);

    state.increment_active_jobs();
    let invoked = state.transform.transform(&artifact.path, &output).await;
    state.decrement_active_jobs();

    // Both paths are scheduled exactly once, whatever the invocation outcome;
    // a never-written output is a no-op at sweep time.
    state.cleanup.schedule(artifact.path.clone());
    state.cleanup.schedule(output.clone());

    match invoked {
        Ok(()) => {
            info!(
                input = %artifact.stored_name,
                output = %output.display(),
                "vocal removal finished"
            );
            // Invoked -> Delivered; the handler streams the file, and
            // CleanupScheduled already holds for both artifacts.
            Ok(ProcessedDelivery {
                path: output,
                download_name: format!("{}{}", OUTPUT_PREFIX, artifact.original_name),
                media_type: artifact.media_type,
            })
        }
        Err(e) => {
            warn!(input = %artifact.stored_name, error = %e, "vocal removal failed");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::error::AppError;
    use crate::state::AppState;
    use crate::transform::ChannelDifferenceTransform;
    use actix_web::http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
    use actix_web::web::Bytes;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    const BOUNDARY: &str = "test-boundary-7fa3";

    fn test_state(root: &std::path::Path) -> AppState {
        let mut config = AppConfig::default();
        config.storage.upload_dir = root.join("uploads").to_string_lossy().into_owned();
        config.storage.processed_dir = root.join("processed").to_string_lossy().into_owned();
        config.storage.cleanup_delay_secs = 0;
        AppState::new(config, Arc::new(ChannelDifferenceTransform))
    }

    /// Build a single-field multipart body the way a browser would.
    fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart(body: Vec<u8>) -> Multipart {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&format!("multipart/form-data; boundary={BOUNDARY}")).unwrap(),
        );
        let stream = futures_util::stream::once(async move {
            Ok::<_, actix_web::error::PayloadError>(Bytes::from(body))
        });
        Multipart::new(&headers, stream)
    }

    fn stereo_wav_bytes(frames: usize) -> Vec<u8> {
        let mut samples = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            samples.push(((i % 7) as i16) * 100);
            samples.push(((i % 5) as i16) * 50);
        }
        let header = wav::Header::new(wav::WAV_FORMAT_PCM, 2, 44_100, 16);
        let mut cursor = std::io::Cursor::new(Vec::new());
        wav::write(header, &wav::BitDepth::Sixteen(samples), &mut cursor).unwrap();
        cursor.into_inner()
    }

    #[tokio::test]
    async fn test_successful_run_schedules_both_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        let payload = multipart(multipart_body("audioFile", "song.wav", "audio/wav", &stereo_wav_bytes(256)));

        let delivery = process_upload(&state, payload).await.unwrap();
        assert_eq!(delivery.download_name, "instrumental_song.wav");
        assert_eq!(delivery.media_type, "audio/wav");
        assert!(delivery.path.exists());

        // One upload and one output, both scheduled exactly once
        assert_eq!(state.cleanup.pending(), 2);
        state.cleanup.sweep(Instant::now() + Duration::from_secs(1)).await;
        assert!(!delivery.path.exists());
        assert_eq!(std::fs::read_dir(tmp.path().join("uploads")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_non_audio_type_never_reaches_the_transform() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        let payload = multipart(multipart_body("audioFile", "notes.txt", "text/plain", b"hello"));

        let result = process_upload(&state, payload).await;
        assert!(matches!(result, Err(AppError::UnsupportedMediaType(_))));

        // Nothing persisted, nothing scheduled
        assert_eq!(state.cleanup.pending(), 0);
        assert!(!tmp.path().join("processed").exists());
    }

    #[tokio::test]
    async fn test_oversize_upload_is_discarded() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        {
            let mut config = state.get_config();
            config.processing.max_upload_bytes = 1024;
            *state.config.write().unwrap() = config;
        }
        let payload = multipart(multipart_body("audioFile", "big.wav", "audio/wav", &vec![0u8; 4096]));

        let result = process_upload(&state, payload).await;
        assert!(matches!(result, Err(AppError::PayloadTooLarge(1024))));

        // The partial upload is gone and nothing reached the processed dir
        assert_eq!(std::fs::read_dir(tmp.path().join("uploads")).unwrap().count(), 0);
        assert!(!tmp.path().join("processed").exists());
    }

    #[tokio::test]
    async fn test_missing_field_is_no_file_present() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        let payload = multipart(multipart_body("somethingElse", "song.wav", "audio/wav", b"data"));

        let result = process_upload(&state, payload).await;
        assert!(matches!(result, Err(AppError::NoFilePresent)));
    }

    /// Invocation failure still schedules the accepted upload for cleanup.
    #[tokio::test]
    async fn test_failed_invocation_schedules_input_cleanup() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        // Declared audio/*, but not parseable by the in-process transform
        let payload = multipart(multipart_body("audioFile", "noise.mp3", "audio/mpeg", b"not a wav"));

        let result = process_upload(&state, payload).await;
        assert!(matches!(result, Err(AppError::ProcessingFailed { .. })));

        assert_eq!(state.cleanup.pending(), 2);
        state.cleanup.sweep(Instant::now() + Duration::from_secs(1)).await;
        assert_eq!(std::fs::read_dir(tmp.path().join("uploads")).unwrap().count(), 0);
    }
}
