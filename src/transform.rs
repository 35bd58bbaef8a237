//! # Media Transform and Capability Probe
//!
//! Abstracts the one media operation this service performs: producing an
//! instrumental track by cancelling center-panned content out of a stereo
//! recording. The production implementation shells out to ffmpeg; a pure
//! in-process implementation computes the same channel difference for tests.
//!
//! ## Transform Semantics:
//! With stereo channels left = L and right = R, the instrumental output is
//! `L' = L - R`, `R' = R - L`. The filter string below encodes exactly that
//! and is a named constant, not a tunable parameter; any implementation of
//! [`MediaTransform`] must reproduce this channel arithmetic.
//!
//! ## Invocation Rules:
//! - One invocation per request, never retried
//! - Input and output paths are passed as discrete argv entries, never
//!   interpolated into a shell string
//! - Nonzero exit or spawn failure surfaces as `ProcessingFailed` with the
//!   captured stderr

use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Stereo difference filter: c0 = L - R, c1 = R - L.
pub const VOCAL_CUT_FILTER: &str = "pan=stereo|c0=c0-c1|c1=c1-c0";

/// Outcome of the capability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    Available,
    Unavailable(String),
}

/// Capability interface for the vocal-removal transform.
///
/// One production adapter (ffmpeg) and one in-process double implement this;
/// the orchestrator only ever sees the trait object.
#[async_trait]
pub trait MediaTransform: Send + Sync {
    /// Transform `input` into an instrumental rendition at `output`.
    async fn transform(&self, input: &Path, output: &Path) -> AppResult<()>;

    /// Report whether the transform can run on this host.
    ///
    /// Must not touch request state or storage.
    async fn check_availability(&self) -> ToolStatus;
}

/// Production transform: invokes the external ffmpeg binary.
pub struct FfmpegTransform {
    tool_path: String,
    probe_timeout: Duration,
}

impl FfmpegTransform {
    pub fn new(tool_path: impl Into<String>, probe_timeout: Duration) -> Self {
        Self {
            tool_path: tool_path.into(),
            probe_timeout,
        }
    }
}

#[async_trait]
impl MediaTransform for FfmpegTransform {
    async fn transform(&self, input: &Path, output: &Path) -> AppResult<()> {
        debug!(tool = %self.tool_path, input = %input.display(), output = %output.display(), "invoking external transform");

        // Paths go through as separate args; no shell is involved
        let result = Command::new(&self.tool_path)
            .arg("-y")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(input)
            .arg("-af")
            .arg(VOCAL_CUT_FILTER)
            .arg(output)
            .output()
            .await
            .map_err(|e| AppError::processing(format!("failed to start {}: {}", self.tool_path, e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            let detail = if stderr.is_empty() {
                format!("{} exited with {}", self.tool_path, result.status)
            } else {
                stderr
            };
            return Err(AppError::processing(detail));
        }

        Ok(())
    }

    async fn check_availability(&self) -> ToolStatus {
        let probe = Command::new(&self.tool_path).arg("-version").output();
        match tokio::time::timeout(self.probe_timeout, probe).await {
            Ok(Ok(output)) if output.status.success() => ToolStatus::Available,
            Ok(Ok(output)) => ToolStatus::Unavailable(format!(
                "{} -version exited with {}",
                self.tool_path, output.status
            )),
            Ok(Err(e)) => ToolStatus::Unavailable(format!(
                "{} is not installed or not in PATH: {}",
                self.tool_path, e
            )),
            Err(_) => ToolStatus::Unavailable(format!(
                "{} -version did not answer within {:?}",
                self.tool_path, self.probe_timeout
            )),
        }
    }
}

/// In-process transform double for 16-bit stereo WAV files.
///
/// Computes the same `L - R` / `R - L` channel difference as the ffmpeg
/// filter, saturating at the i16 rails. Only used by tests; always reports
/// itself available.
pub struct ChannelDifferenceTransform;

#[async_trait]
impl MediaTransform for ChannelDifferenceTransform {
    async fn transform(&self, input: &Path, output: &Path) -> AppResult<()> {
        let mut reader = std::fs::File::open(input)
            .map_err(|e| AppError::processing(format!("cannot open {}: {}", input.display(), e)))?;
        let (header, data) = wav::read(&mut reader)
            .map_err(|e| AppError::processing(format!("not a readable WAV file: {}", e)))?;

        if header.channel_count != 2 {
            return Err(AppError::processing(format!(
                "expected stereo input, got {} channel(s)",
                header.channel_count
            )));
        }

        let samples = match data {
            wav::BitDepth::Sixteen(samples) => samples,
            _ => {
                return Err(AppError::processing(format!(
                    "expected 16-bit PCM, got {} bits per sample",
                    header.bits_per_sample
                )))
            }
        };

        // Interleaved frames: [L, R, L, R, ...]
        let mut instrumental = Vec::with_capacity(samples.len());
        for frame in samples.chunks_exact(2) {
            let (left, right) = (frame[0], frame[1]);
            instrumental.push(left.saturating_sub(right));
            instrumental.push(right.saturating_sub(left));
        }

        let mut writer = std::fs::File::create(output)
            .map_err(|e| AppError::processing(format!("cannot create {}: {}", output.display(), e)))?;
        wav::write(header, &wav::BitDepth::Sixteen(instrumental), &mut writer)
            .map_err(|e| AppError::processing(format!("cannot write output: {}", e)))?;

        Ok(())
    }

    async fn check_availability(&self) -> ToolStatus {
        ToolStatus::Available
    }
}
