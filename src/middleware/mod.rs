pub mod logging;
pub mod metrics;
pub mod rate_limit;

pub use logging::RequestLogging;
pub use metrics::MetricsMiddleware;
pub use rate_limit::{RateLimit, RateLimiter};
