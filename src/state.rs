//! # Application State Management
//!
//! This module manages shared state that needs to be accessed by multiple HTTP request handlers
//! simultaneously.
//!
//! ## Key Rust Concepts:
//!
//! ### Arc (Atomically Reference Counted)
//! - **Purpose**: Allows multiple parts of the program to safely share ownership of data
//! - **Why needed**: Multiple HTTP requests run simultaneously and all need access to the same state
//!
//! ### RwLock (Reader-Writer Lock)
//! - **Purpose**: Allows multiple readers OR one writer at a time (but not both)
//! - **Why needed**: Many requests read the config simultaneously; updates are rare
//!
//! ### Arc<RwLock<T>> Pattern
//! - **Arc**: Multiple ownership (many HTTP handlers can hold a reference)
//! - **RwLock**: Thread-safe read/write access
//! - **T**: The actual data type being protected
//!
//! The pipeline collaborators (storage manager, cleanup queue, media
//! transform) are constructed once from the loaded configuration and shared
//! here; request handlers never build their own.

use crate::cleanup::CleanupQueue;
use crate::config::AppConfig;         // Our configuration types
use crate::storage::StorageManager;
use crate::transform::MediaTransform;
use std::collections::HashMap;        // For storing per-endpoint metrics
use std::sync::{Arc, RwLock};         // Thread-safe shared ownership and locking
use std::time::{Duration, Instant};   // For tracking server uptime

/// The main application state that's shared across all HTTP request handlers.
///
/// ## Thread Safety Pattern:
/// Mutable data lives behind Arc<RwLock<T>>; the storage manager and cleanup
/// queue are internally synchronized and cheap to clone; the transform is an
/// immutable trait object.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime)
    pub config: Arc<RwLock<AppConfig>>,

    /// Performance metrics (constantly being updated by requests)
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started (never changes, so no Arc<RwLock> needed)
    pub start_time: Instant,

    /// Temporary storage manager for the upload/processed directories
    pub storage: StorageManager,

    /// Deferred artifact cleanup queue (one background sweep drains it)
    pub cleanup: CleanupQueue,

    /// Active vocal-removal capability (ffmpeg in production, an in-process
    /// double in tests)
    pub transform: Arc<dyn MediaTransform>,
}

/// Performance metrics collected across all HTTP requests.
///
/// ## Why these metrics matter:
/// - **request_count**: Total requests processed (for load monitoring)
/// - **error_count**: Total errors (for reliability monitoring)
/// - **active_jobs**: External tool invocations currently in flight
/// - **endpoint_metrics**: Per-endpoint statistics (for performance optimization)
#[derive(Debug, Default)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of errors encountered since server start
    pub error_count: u64,

    /// Current number of in-flight external processing jobs
    pub active_jobs: u32,

    /// Detailed metrics for each API endpoint (URL path)
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Detailed performance metrics for a specific API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    /// Number of requests to this specific endpoint
    pub request_count: u64,

    /// Total time spent processing all requests to this endpoint (milliseconds)
    pub total_duration_ms: u64,

    /// Number of errors that occurred for this endpoint
    pub error_count: u64,
}

/// Implementation of methods for AppState.
impl AppState {
    /// Create a new AppState from the loaded configuration and the chosen
    /// transform implementation.
    ///
    /// The storage manager takes the storage section of the config at
    /// construction; the cleanup queue takes the configured delay. Both are
    /// fixed for the process lifetime even if other config fields are later
    /// updated.
    pub fn new(config: AppConfig, transform: Arc<dyn MediaTransform>) -> Self {
        let storage = StorageManager::new(config.storage.clone());
        let cleanup = CleanupQueue::new(Duration::from_secs(config.storage.cleanup_delay_secs));
        Self {
            // Wrap config for thread-safe sharing and updating
            config: Arc::new(RwLock::new(config)),
            // Start with empty metrics
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            // Record when the server started
            start_time: Instant::now(),
            storage,
            cleanup,
            transform,
        }
    }

    /// Get a copy of the current configuration.
    ///
    /// ## Why clone:
    /// Cloning releases the lock immediately, so other threads aren't blocked.
    /// AppConfig is designed to be cheap to clone.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// Increment the total request counter (called by middleware for every request).
    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.request_count += 1;
    }

    /// Increment the total error counter (called when any request fails).
    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.error_count += 1;
    }

    /// Record detailed metrics for a specific endpoint.
    ///
    /// ## Parameters:
    /// - **endpoint**: The API endpoint (e.g., "POST /api/audio/remove-vocals")
    /// - **duration_ms**: How long the request took to process (in milliseconds)
    /// - **is_error**: Whether this request resulted in an error
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();

        // Get or create metrics for this specific endpoint
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        // Update the metrics for this endpoint
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Increment the in-flight job gauge (an external invocation started).
    pub fn increment_active_jobs(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.active_jobs += 1;
    }

    /// Decrement the in-flight job gauge (an external invocation finished).
    ///
    /// ## Safety check:
    /// Includes a check to prevent underflow (going below zero).
    pub fn decrement_active_jobs(&self) {
        let mut metrics = self.metrics.write().unwrap();
        if metrics.active_jobs > 0 {
            metrics.active_jobs -= 1;
        }
    }

    /// Get a snapshot of current metrics (used for the /api/metrics endpoint).
    ///
    /// ## Why a snapshot:
    /// Clones the data under a read lock so we don't hold the lock while
    /// serializing the HTTP response.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        let metrics = self.metrics.read().unwrap();
        AppMetrics {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            active_jobs: metrics.active_jobs,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    /// Get server uptime in seconds.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Implementation of utility methods for EndpointMetric.
impl EndpointMetric {
    /// Calculate the average response time for this endpoint.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0  // No requests yet, so no average to calculate
        }
    }

    /// Calculate the error rate for this endpoint as a fraction (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0  // No requests yet, so no errors possible
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::transform::ChannelDifferenceTransform;

    fn state() -> AppState {
        AppState::new(AppConfig::default(), Arc::new(ChannelDifferenceTransform))
    }

    #[test]
    fn test_request_and_error_counters() {
        let state = state();
        state.increment_request_count();
        state.increment_request_count();
        state.increment_error_count();
        state.record_endpoint_request("POST /api/audio/remove-vocals", 120, true);

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.request_count, 2);
        assert_eq!(snapshot.error_count, 1);
        let endpoint = &snapshot.endpoint_metrics["POST /api/audio/remove-vocals"];
        assert_eq!(endpoint.request_count, 1);
        assert_eq!(endpoint.error_count, 1);
        assert!(endpoint.error_rate() > 0.99);
    }

    #[test]
    fn test_active_jobs_never_underflows() {
        let state = state();
        state.decrement_active_jobs();
        assert_eq!(state.get_metrics_snapshot().active_jobs, 0);
        state.increment_active_jobs();
        state.decrement_active_jobs();
        assert_eq!(state.get_metrics_snapshot().active_jobs, 0);
    }
}
