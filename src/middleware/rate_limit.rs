use crate::error::AppError;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures_util::future::LocalBoxFuture;
use std::{
    collections::HashMap,
    future::{ready, Ready},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tracing::debug;

/// Fixed-window request counter keyed by client IP.
///
/// Each client gets `max_requests` per `window`; the counter resets when a
/// request arrives after the window expired. Coarse on purpose - this is
/// the same 100-per-15-minutes policy the public API documents, not a
/// traffic shaper.
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    clients: Mutex<HashMap<String, WindowCounter>>,
}

struct WindowCounter {
    window_start: Instant,
    count: u32,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request for `client` at `now`; false means over budget.
    ///
    /// Taking `now` as a parameter keeps the window arithmetic testable
    /// without waiting out real windows.
    pub fn try_acquire(&self, client: &str, now: Instant) -> bool {
        let mut clients = self.clients.lock().unwrap();
        let counter = clients
            .entry(client.to_string())
            .or_insert(WindowCounter {
                window_start: now,
                count: 0,
            });

        if now.duration_since(counter.window_start) >= self.window {
            counter.window_start = now;
            counter.count = 0;
        }

        counter.count += 1;
        counter.count <= self.max_requests
    }
}

/// Actix middleware wrapping a shared [`RateLimiter`].
pub struct RateLimit {
    limiter: Arc<RateLimiter>,
}

impl RateLimit {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddleware {
            service,
            limiter: self.limiter.clone(),
        }))
    }
}

pub struct RateLimitMiddleware<S> {
    service: S,
    limiter: Arc<RateLimiter>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let client = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();

        if !self.limiter.try_acquire(&client, Instant::now()) {
            debug!(%client, "request over rate limit");
            return Box::pin(ready(Err(AppError::RateLimited.into())));
        }

        let fut = self.service.call(req);
        Box::pin(fut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_is_enforced_within_window() {
        let limiter = RateLimiter::new(Duration::from_secs(900), 2);
        let now = Instant::now();

        assert!(limiter.try_acquire("10.0.0.1", now));
        assert!(limiter.try_acquire("10.0.0.1", now));
        assert!(!limiter.try_acquire("10.0.0.1", now), "third request must be denied");

        // Another client has its own budget
        assert!(limiter.try_acquire("10.0.0.2", now));
    }

    #[test]
    fn test_window_resets_the_budget() {
        let limiter = RateLimiter::new(Duration::from_secs(900), 1);
        let now = Instant::now();

        assert!(limiter.try_acquire("10.0.0.1", now));
        assert!(!limiter.try_acquire("10.0.0.1", now));

        let next_window = now + Duration::from_secs(901);
        assert!(limiter.try_acquire("10.0.0.1", next_window));
    }
}
