//! # Error Handling
//!
//! This module defines the error taxonomy for the upload-process-deliver pipeline
//! and how each error is converted to an HTTP response.
//!
//! ## Key Rust Concepts for Error Handling:
//!
//! ### Result<T, E> Type
//! - **Purpose**: Forces you to handle both success and failure cases
//! - **No exceptions**: Rust doesn't have try/catch, it uses Result instead
//!
//! ### Enums for Error Types
//! - **Variants**: Each enum variant represents a different pipeline failure
//! - **Data**: Variants carry the diagnostic detail they were created with
//!
//! ### Traits for Error Conversion
//! - **ResponseError trait**: Converts errors to HTTP responses
//! - **Display trait**: Defines how errors are formatted as strings
//!
//! ## Error Categories:
//! Intake failures (client-fault, 400) are distinct from processing failures
//! (server-fault, 500) and from environment failures (tool missing, 503).
//! Intake and processing failures carry diagnostic detail in the response body;
//! unrelated internal faults never do.

use actix_web::{HttpResponse, ResponseError};  // Web framework error handling
use serde_json::json;                          // For creating JSON error responses
use std::fmt;                                  // For implementing Display trait

/// Errors produced by the audio processing pipeline and its surroundings.
///
/// ## HTTP Mapping:
/// - **NoFilePresent / UnsupportedMediaType / PayloadTooLarge**: intake-stage,
///   client-fault, 400
/// - **ToolUnavailable**: environment-fault, 503 (capability probe only)
/// - **ProcessingFailed**: external tool exited nonzero or could not be
///   spawned, 500; carries captured diagnostic output
/// - **Storage**: unrecoverable filesystem error (permissions, disk full), 500
/// - **RateLimited**: request budget for the client's window exhausted, 429
/// - **Internal**: anything else, 500
///
/// ## Usage Example:
/// ```rust
/// return Err(AppError::NoFilePresent);
/// ```
#[derive(Debug)]
pub enum AppError {
    /// Request contained no usable `audioFile` multipart field
    NoFilePresent,

    /// Declared content type does not begin with `audio/`
    UnsupportedMediaType(String),

    /// Upload stream exceeded the configured byte limit
    PayloadTooLarge(u64),

    /// The external media tool could not be located or probed
    ToolUnavailable(String),

    /// External tool invocation failed (nonzero exit or spawn error)
    ProcessingFailed {
        message: String,
        detail: Option<String>,
    },

    /// Unrecoverable filesystem error while managing temporary storage
    Storage(String),

    /// Client exceeded the per-window request budget
    RateLimited,

    /// Internal server errors not covered by the taxonomy above
    Internal(String),
}

impl AppError {
    /// Shorthand for a processing failure carrying the tool's captured output.
    pub fn processing(detail: impl Into<String>) -> Self {
        AppError::ProcessingFailed {
            message: "Error processing audio file".to_string(),
            detail: Some(detail.into()),
        }
    }
}

/// Implementation of the Display trait for AppError.
///
/// ## Purpose:
/// This trait defines how errors are formatted as human-readable strings.
/// It's used when you print an error or convert it to a string.
impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NoFilePresent => write!(f, "No audio file uploaded"),
            AppError::UnsupportedMediaType(declared) => {
                write!(f, "Only audio files are allowed (got {})", declared)
            }
            AppError::PayloadTooLarge(limit) => {
                write!(f, "Uploaded file exceeds the {} byte limit", limit)
            }
            AppError::ToolUnavailable(detail) => {
                write!(f, "Audio processing system is unavailable: {}", detail)
            }
            AppError::ProcessingFailed { message, detail } => match detail {
                Some(detail) => write!(f, "{}: {}", message, detail),
                None => write!(f, "{}", message),
            },
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::RateLimited => write!(f, "Too many requests"),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

/// Implementation of the ResponseError trait for AppError.
///
/// ## JSON Response Format:
/// All failures return JSON with a consistent structure:
/// ```json
/// {
///   "message": "Error processing audio file",
///   "error": "ffmpeg: unknown filter 'pan'"
/// }
/// ```
/// The `error` field (raw diagnostic detail) only appears for intake and
/// processing failures; internal faults return `message` alone.
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        // Map each error to HTTP status, client message, and optional detail
        let (status, message, detail) = match self {
            AppError::NoFilePresent => (
                actix_web::http::StatusCode::BAD_REQUEST,  // 400
                "No audio file uploaded".to_string(),
                None,
            ),
            AppError::UnsupportedMediaType(declared) => (
                actix_web::http::StatusCode::BAD_REQUEST,  // 400
                "Only audio files are allowed".to_string(),
                Some(format!("unsupported content type: {}", declared)),
            ),
            AppError::PayloadTooLarge(limit) => (
                actix_web::http::StatusCode::BAD_REQUEST,  // 400
                "Audio file is too large".to_string(),
                Some(format!("the upload limit is {} bytes", limit)),
            ),
            AppError::ToolUnavailable(detail) => (
                actix_web::http::StatusCode::SERVICE_UNAVAILABLE,  // 503
                "Audio processing system is unavailable".to_string(),
                Some(detail.clone()),
            ),
            AppError::ProcessingFailed { message, detail } => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,  // 500
                message.clone(),
                detail.clone(),
            ),
            AppError::Storage(_) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,  // 500
                "Temporary storage is unavailable".to_string(),
                None,
            ),
            AppError::RateLimited => (
                actix_web::http::StatusCode::TOO_MANY_REQUESTS,  // 429
                "Too many requests, please try again later".to_string(),
                None,
            ),
            AppError::Internal(_) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,  // 500
                "Internal server error".to_string(),
                None,
            ),
        };

        // Build the HTTP response with JSON body
        let body = match detail {
            Some(detail) => json!({ "message": message, "error": detail }),
            None => json!({ "message": message }),
        };
        HttpResponse::build(status).json(body)
    }
}

/// Automatic conversion from anyhow::Error to AppError.
///
/// ## Usage:
/// When you use `?` with an anyhow::Error, it automatically becomes an
/// AppError::Internal. Startup and configuration code uses anyhow directly;
/// request handlers use AppError.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Type alias for Results that use our custom error type.
///
/// ## Usage Example:
/// ```rust
/// fn receive_upload() -> AppResult<UploadedArtifact> { ... }
/// ```
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    /// Intake errors are client faults and must map to 400.
    #[test]
    fn test_intake_errors_are_bad_requests() {
        for err in [
            AppError::NoFilePresent,
            AppError::UnsupportedMediaType("text/plain".to_string()),
            AppError::PayloadTooLarge(1024),
        ] {
            assert_eq!(err.error_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_environment_and_server_faults() {
        assert_eq!(
            AppError::ToolUnavailable("not in PATH".to_string())
                .error_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::processing("exit status 1").error_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::RateLimited.error_response().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    /// The Display form carries detail for logs.
    #[test]
    fn test_display_includes_detail() {
        let rendered = AppError::processing("pan filter rejected input").to_string();
        assert!(rendered.contains("pan filter rejected input"));
    }
}
