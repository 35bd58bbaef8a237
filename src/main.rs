//! # Tools Backend - Main Application Entry Point
//!
//! This is the main entry point for the tools-backend web server. It sets up
//! an Actix-web HTTP server exposing the browser-facing utility tools API:
//! the static tool catalog and the audio vocal-remover pipeline.
//!
//! ## Key Rust Concepts Used:
//! - **async/await**: The entire application is asynchronous for better performance
//! - **modules**: Code is organized into separate modules (mod statements)
//! - **Result<T, E>**: Error handling using Rust's Result type
//! - **Arc & RwLock**: Thread-safe shared state management
//! - **static**: Global variables that live for the entire program duration
//!
//! ## Application Architecture:
//! - **config**: Application configuration (TOML files + environment variables)
//! - **state**: Shared application state and metrics
//! - **storage**: Temporary storage manager for uploads and processed output
//! - **intake**: Multipart upload validation and persistence
//! - **transform**: External media tool invocation and capability probe
//! - **pipeline**: The upload-process-deliver-cleanup orchestrator
//! - **delivery**: Streaming download responses
//! - **cleanup**: Deferred artifact deletion queue
//! - **middleware**: Request logging, metrics, and rate limiting
//! - **handlers**: HTTP request handlers for API endpoints
//! - **error**: Error taxonomy and HTTP error responses

// Module declarations - These tell Rust about our other source files
mod cleanup;     // Deferred artifact deletion (cleanup.rs)
mod config;      // Configuration management (config.rs)
mod delivery;    // Streaming download responses (delivery.rs)
mod error;       // Error handling types (error.rs)
mod handlers;    // HTTP request handlers (handlers/ directory)
mod health;      // Health check endpoints (health.rs)
mod intake;      // Upload validation and persistence (intake.rs)
mod middleware;  // Custom middleware (middleware/ directory)
mod pipeline;    // Processing orchestrator (pipeline.rs)
mod state;       // Application state management (state.rs)
mod storage;     // Temporary storage manager (storage.rs)
mod transform;   // Media transform capability (transform.rs)

// External crate imports - These are dependencies from Cargo.toml
use actix_cors::Cors;  // Cross-Origin Resource Sharing support
use actix_web::{web, App, HttpServer, middleware::Logger};  // Web framework
use anyhow::Result;    // Better error handling with context
use config::AppConfig; // Our custom configuration struct
use state::AppState;   // Our custom application state
use std::sync::atomic::{AtomicBool, Ordering};  // Thread-safe boolean for shutdown
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, error};  // Structured logging
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};  // Logging setup

/// Global shutdown signal that can be accessed from anywhere in the program.
/// AtomicBool is thread-safe, meaning multiple threads can safely read/write to it.
/// This is used to signal when the server should gracefully shut down.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Loads configuration** from files and environment variables
/// 2. **Sets up logging** for debugging and monitoring
/// 3. **Creates shared application state** that all requests can access
/// 4. **Starts the background cleanup sweep** for temporary artifacts
/// 5. **Configures the HTTP server** with middleware and routes
/// 6. **Handles graceful shutdown** when receiving system signals
#[actix_web::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists)
    // .ok() means "ignore errors" - it's fine if there's no .env file
    dotenv::dotenv().ok();

    // Set up structured logging (tracing) for debugging and monitoring
    init_tracing()?;

    // Load application configuration from config.toml and environment variables
    let config = AppConfig::load()?;
    // Validate that the configuration makes sense (e.g., port isn't 0)
    config.validate()?;

    info!("Starting tools-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    // The production transform shells out to the configured media tool
    let transform: Arc<dyn transform::MediaTransform> = Arc::new(transform::FfmpegTransform::new(
        config.processing.ffmpeg_path.clone(),
        Duration::from_secs(config.processing.probe_timeout_secs),
    ));

    // Create the shared application state that all HTTP requests can access
    let app_state = AppState::new(config.clone(), transform);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    // Background sweep that removes artifacts once their delay elapses.
    // Fire-and-forget: nothing a request does waits on this task.
    tokio::spawn(app_state.cleanup.clone().run());

    // One rate limiter shared across all server workers
    let limiter = Arc::new(middleware::RateLimiter::new(
        Duration::from_secs(config.rate_limit.window_secs),
        config.rate_limit.max_requests,
    ));

    // Set up signal handlers for graceful shutdown (Ctrl+C, SIGTERM, etc.)
    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let cors_origin = config.server.cors_origin.clone();

    // Create the HTTP server with all its configuration
    let server = HttpServer::new(move || {
        // Configure CORS: a single allowed origin when deployment sets one,
        // otherwise any origin (development)
        let cors = match &cors_origin {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .allow_any_method()
                .allow_any_header()
                .supports_credentials()
                .max_age(3600),
            None => Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600),
        };

        // Create the main application with all its configuration
        App::new()
            // Share our application state with all request handlers
            .app_data(web::Data::new(app_state.clone()))
            // Add middleware in order (they execute in reverse order for responses)
            .wrap(cors)                                              // Handle CORS
            .wrap(Logger::default())                                 // Log HTTP requests
            .wrap(middleware::MetricsMiddleware)                     // Collect performance metrics
            .wrap(middleware::RequestLogging)                        // Custom request logging
            .wrap(middleware::RateLimit::new(limiter.clone()))       // Fixed-window rate limiting
            // Public API routes
            .route("/", web::get().to(handlers::index))
            .route("/health", web::get().to(health::health_check))
            .service(
                web::scope("/api")
                    .route("/tools", web::get().to(handlers::list_tools))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .service(
                        web::scope("/audio")
                            .route("/status", web::get().to(handlers::audio_status))
                            .route("/remove-vocals", web::post().to(handlers::remove_vocals)),
                    ),
            )
    })
    .bind(&bind_addr)?  // Bind to the configured host and port
    .run();             // Start the server (but don't block here)

    // Get a handle to control the server and spawn it in a separate task
    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    // Wait for either the server to finish OR a shutdown signal
    // tokio::select! is like a "race" - whichever finishes first wins
    tokio::select! {
        // If the server task finishes (which usually means an error)
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        // If we receive a shutdown signal (Ctrl+C, SIGTERM, etc.)
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;  // Gracefully stop the server
        }
    }

    info!("Server stopped gracefully");
    Ok(())  // Return success
}

/// Initialize the tracing (logging) system for the application.
///
/// ## Environment Variables:
/// - `RUST_LOG`: Controls what gets logged (e.g., "debug", "info", "tools_backend=debug")
/// - If not set, defaults to "tools_backend=debug,actix_web=info"
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            // Try to read RUST_LOG environment variable, or use defaults
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tools_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())  // Format logs nicely for console output
        .init();  // Actually start the logging system

    Ok(())
}

/// Set up signal handlers for graceful shutdown.
///
/// ## What this does:
/// - Listens for SIGTERM (termination signal from system)
/// - Listens for SIGINT (interrupt signal, usually Ctrl+C)
/// - When either signal is received, sets the global shutdown flag
///
/// ## Why this matters:
/// Graceful shutdown means the server can finish processing current requests
/// before shutting down, rather than just stopping immediately. In-flight
/// external invocations run to completion before the process exits.
fn setup_signal_handlers() {
    tokio::spawn(async {
        // Set up handlers for different types of shutdown signals
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("Failed to install SIGINT handler");

        // Wait for either signal to arrive
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        // Set the global shutdown flag so other parts of the program know to stop
        // SeqCst (Sequential Consistency) ensures this change is visible to all threads
        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Wait for the shutdown signal to be set.
///
/// ## What this does:
/// - Continuously checks if the shutdown signal has been set
/// - Sleeps for 100ms between checks to avoid busy-waiting
/// - Returns when shutdown has been requested
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        // Sleep for 100ms, then check again
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
