//! # Audio Processing REST API Handlers
//!
//! HTTP surface of the vocal-removal pipeline:
//! - `GET /api/audio/status` - capability probe for the external tool
//! - `POST /api/audio/remove-vocals` - upload, process, stream back
//!
//! The handlers are thin: validation and sequencing live in the pipeline
//! module, delivery framing in the delivery module. Errors bubble out as
//! `AppError` and render through its `ResponseError` impl.

use crate::delivery;
use crate::error::AppResult;
use crate::pipeline;
use crate::state::AppState;
use crate::transform::ToolStatus;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::warn;

/// `GET /api/audio/status` - report whether the processing system can run.
///
/// Probes the external tool with a version query; touches no storage and no
/// request state. Unavailability maps to 503 with the probe's detail.
pub async fn audio_status(state: web::Data<AppState>) -> HttpResponse {
    match state.transform.check_availability().await {
        ToolStatus::Available => HttpResponse::Ok().json(json!({
            "status": "available",
            "message": "Audio processing system is available"
        })),
        ToolStatus::Unavailable(detail) => {
            warn!(detail = %detail, "capability probe failed");
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unavailable",
                "message": "Audio processing system is unavailable",
                "details": detail
            }))
        }
    }
}

/// `POST /api/audio/remove-vocals` - run one upload through the pipeline.
///
/// On success the response is the instrumental rendition as an attachment
/// named `instrumental_<original filename>`. Every failure renders as the
/// pipeline's JSON error body; cleanup of anything written is already
/// scheduled by the time either outcome leaves this handler.
pub async fn remove_vocals(
    state: web::Data<AppState>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let processed = pipeline::process_upload(&state, payload).await?;
    Ok(delivery::attachment_response(processed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::transform::ChannelDifferenceTransform;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    const BOUNDARY: &str = "handler-test-boundary";

    fn test_state(root: &std::path::Path) -> AppState {
        let mut config = AppConfig::default();
        config.storage.upload_dir = root.join("uploads").to_string_lossy().into_owned();
        config.storage.processed_dir = root.join("processed").to_string_lossy().into_owned();
        config.storage.cleanup_delay_secs = 0;
        AppState::new(config, Arc::new(ChannelDifferenceTransform))
    }

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

    fn upload_request(body: Vec<u8>) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/audio/remove-vocals")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(body)
    }

    /// Roughly 2 MiB of deterministic 16-bit stereo audio.
    fn two_mib_stereo_wav() -> Vec<u8> {
        let frames = 512 * 1024;
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

    #[actix_web::test]
    async fn test_upload_round_trip_and_cleanup() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .route("/api/audio/remove-vocals", web::post().to(remove_vocals)),
        )
        .await;

        let request = upload_request(multipart_body(
            "audioFile",
            "my track.wav",
            "audio/wav",
            &two_mib_stereo_wav(),
        ));
        let response = test::call_service(&app, request.to_request()).await;

        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get("content-disposition")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(
            disposition.contains("instrumental_my track.wav"),
            "got {disposition}"
        );

        let body = test::read_body(response).await;
        assert!(!body.is_empty());

        // Both artifacts exist until the delay elapses, then are swept
        assert_eq!(state.cleanup.pending(), 2);
        state.cleanup.sweep(Instant::now() + Duration::from_secs(1)).await;
        assert_eq!(std::fs::read_dir(tmp.path().join("uploads")).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(tmp.path().join("processed")).unwrap().count(), 0);
    }

    #[actix_web::test]
    async fn test_mismatched_content_type_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/api/audio/remove-vocals", web::post().to(remove_vocals)),
        )
        .await;

        // A text file smuggled in with a non-audio declared type
        let request = upload_request(multipart_body(
            "audioFile",
            "lyrics.txt",
            "text/plain",
            b"la la la",
        ));
        let response = test::call_service(&app, request.to_request()).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["message"], "Only audio files are allowed");
    }

    #[actix_web::test]
    async fn test_missing_file_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/api/audio/remove-vocals", web::post().to(remove_vocals)),
        )
        .await;

        let request = upload_request(multipart_body("wrongField", "a.wav", "audio/wav", b"x"));
        let response = test::call_service(&app, request.to_request()).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["message"], "No audio file uploaded");
    }

    #[actix_web::test]
    async fn test_status_reports_unavailable_tool() {
        use crate::transform::FfmpegTransform;

        let mut config = AppConfig::default();
        config.processing.ffmpeg_path = "/nonexistent/ffmpeg-binary".to_string();
        let state = AppState::new(
            config,
            Arc::new(FfmpegTransform::new(
                "/nonexistent/ffmpeg-binary",
                Duration::from_secs(2),
            )),
        );
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/api/audio/status", web::get().to(audio_status)),
        )
        .await;

        let request = test::TestRequest::get().uri("/api/audio/status");
        let response = test::call_service(&app, request.to_request()).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["status"], "unavailable");
        assert!(body["details"].as_str().unwrap().contains("ffmpeg-binary"));
    }
}
