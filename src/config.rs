//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: Serialization/deserialization library for converting between Rust structs and data formats
//! - **derive macros**: Automatically generate code for common traits (Debug, Clone, Serialize, Deserialize)
//! - **struct**: Custom data types that group related fields together
//! - **Result<T, E>**: Error handling that forces you to handle potential failures
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, HOST, PORT, CORS_ORIGIN, etc.)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)
//!
//! The upload and processed directories are part of this struct and travel
//! with it into the storage manager; nothing in the pipeline reads ambient
//! global paths.

use anyhow::Result;              // Better error handling with context
use serde::{Deserialize, Serialize};  // For converting to/from TOML, JSON, etc.
use std::env;                    // For reading environment variables

/// Default upload size limit: 50 MiB, matching the public API contract.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Main application configuration that contains all settings.
///
/// ## Why separate config structs:
/// Breaking configuration into logical groups (server, storage, processing,
/// rate limiting) makes it easier to understand and maintain as the
/// application grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub processing: ProcessingConfig,
    pub rate_limit: RateLimitConfig,
}

/// Server-specific configuration settings.
///
/// ## Fields:
/// - `host`: IP address or hostname to bind the server to (e.g., "127.0.0.1", "0.0.0.0")
/// - `port`: TCP port number to listen on (1-65535)
/// - `cors_origin`: exact origin allowed by CORS; `None` allows any origin
///   (development default)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,  // u16 = unsigned 16-bit integer (0-65535), perfect for port numbers
    pub cors_origin: Option<String>,
}

/// Temporary storage configuration.
///
/// ## Fields:
/// - `upload_dir`: where accepted uploads are persisted (created lazily)
/// - `processed_dir`: where the external tool writes its output (created lazily)
/// - `cleanup_delay_secs`: how long after delivery (or failure) artifacts
///   stay on disk before the background sweep removes them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub upload_dir: String,
    pub processed_dir: String,
    pub cleanup_delay_secs: u64,
}

/// External media tool configuration.
///
/// ## Fields:
/// - `ffmpeg_path`: executable name or absolute path of the media tool
/// - `probe_timeout_secs`: upper bound on the capability probe's version query
/// - `max_upload_bytes`: intake size limit (defaults to 50 MiB)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub ffmpeg_path: String,
    pub probe_timeout_secs: u64,
    pub max_upload_bytes: u64,
}

/// Fixed-window request rate limiting, applied per client IP.
///
/// ## Fields:
/// - `window_secs`: window length (default 15 minutes)
/// - `max_requests`: requests allowed per window (default 100)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u32,
}

/// Provides default configuration values.
///
/// ## Why defaults matter:
/// Default values ensure the application can start even if no configuration
/// file exists. They also serve as documentation of reasonable starting values.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),  // Localhost only (safe for development)
                port: 3000,                     // Matches the public API docs
                cors_origin: None,              // Any origin unless deployment says otherwise
            },
            storage: StorageConfig {
                upload_dir: "uploads".to_string(),
                processed_dir: "processed".to_string(),
                cleanup_delay_secs: 60,         // One minute, then artifacts are swept
            },
            processing: ProcessingConfig {
                ffmpeg_path: "ffmpeg".to_string(),  // Resolved via PATH
                probe_timeout_secs: 5,
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            rate_limit: RateLimitConfig {
                window_secs: 15 * 60,  // 15 minutes
                max_requests: 100,
            },
        }
    }
}

/// Implementation block for AppConfig - adds methods to the struct.
impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle special cases for HOST, PORT, and CORS_ORIGIN
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER_HOST=0.0.0.0`: Override server host
    /// - `HOST=0.0.0.0` / `PORT=3000`: Special cases for deployment platforms
    /// - `CORS_ORIGIN=https://tools.example.com`: Restrict CORS to one origin
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            // 1. Start with defaults - converts our Default impl to config format
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // 2. Load from config.toml file (if it exists) - required(false) means "don't error if missing"
            .add_source(config::File::with_name("config").required(false))
            // 3. Load from environment variables with APP_ prefix
            // Example: APP_SERVER_HOST becomes server.host in the config
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Handle special environment variables used by deployment platforms
        // These don't follow the APP_ prefix convention but are commonly used
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        if let Ok(origin) = env::var("CORS_ORIGIN") {
            settings = settings.set_override("server.cors_origin", origin)?;
        }

        if let Ok(tool) = env::var("FFMPEG_PATH") {
            settings = settings.set_override("processing.ffmpeg_path", tool)?;
        }

        // Build the final configuration and convert it back to our AppConfig struct
        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0 (port 0 is reserved and can't be used)
    /// - Storage directories are not empty strings
    /// - The tool path is not empty
    /// - The upload limit and rate-limit window are nonzero
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.storage.upload_dir.is_empty() || self.storage.processed_dir.is_empty() {
            return Err(anyhow::anyhow!("Storage directories must not be empty"));
        }

        if self.processing.ffmpeg_path.is_empty() {
            return Err(anyhow::anyhow!("External tool path must not be empty"));
        }

        if self.processing.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Upload size limit must be greater than 0"));
        }

        if self.rate_limit.window_secs == 0 || self.rate_limit.max_requests == 0 {
            return Err(anyhow::anyhow!("Rate limit window and budget must be greater than 0"));
        }

        Ok(())  // All validation passed
    }
}

/// Tests for the configuration module.
#[cfg(test)]
mod tests {
    use super::*;  // Import everything from the parent module

    /// Test that the default configuration is valid and has expected values.
    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.processing.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.storage.cleanup_delay_secs, 60);
        assert_eq!(config.rate_limit.max_requests, 100);
        // Ensure the default config passes validation
        assert!(config.validate().is_ok());
    }

    /// Test that validation catches invalid configurations.
    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;  // Invalid port
        // Validation should fail for port 0
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.processing.max_upload_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.storage.upload_dir = String::new();
        assert!(config.validate().is_err());
    }
}
