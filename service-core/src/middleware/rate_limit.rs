//! Fixed-window request counting keyed by client.
//!
//! Counters live in process memory only. They are lost on restart and are not
//! shared between instances, and keys are never evicted.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::error::{AppError, CorrelatedError};
use crate::middleware::tracing::CorrelationId;

pub const SESSION_ID_HEADER: &str = "x-session-id";

/// Bucket shared by every caller without a forwarded address or session id.
pub const ANONYMOUS_CLIENT: &str = "anonymous";

/// Shared handle used as middleware state.
pub type SharedRateLimiter = Arc<FixedWindowRateLimiter>;

#[derive(Debug, Clone, Copy)]
struct ClientWindowState {
    count: u32,
    window_reset_at: Instant,
}

#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    clients: DashMap<String, ClientWindowState>,
    window: Duration,
    max_requests_per_window: u32,
}

impl FixedWindowRateLimiter {
    pub fn new(max_requests_per_window: u32, window: Duration) -> Self {
        Self {
            clients: DashMap::new(),
            window,
            max_requests_per_window,
        }
    }

    /// Records one request for `client_key` and reports whether it is over
    /// the limit for the current window.
    pub fn check_and_record(&self, client_key: &str) -> bool {
        self.check_and_record_at(client_key, Instant::now())
    }

    pub fn check_and_record_at(&self, client_key: &str, now: Instant) -> bool {
        // The entry guard holds the shard write lock across reset and increment.
        let mut entry = self
            .clients
            .entry(client_key.to_string())
            .or_insert_with(|| ClientWindowState {
                count: 0,
                window_reset_at: now + self.window,
            });

        if now > entry.window_reset_at {
            *entry = ClientWindowState {
                count: 0,
                window_reset_at: now + self.window,
            };
        }

        entry.count = entry.count.saturating_add(1);
        entry.count > self.max_requests_per_window
    }

    /// Whole seconds until the client's current window resets, rounded up.
    pub fn retry_after(&self, client_key: &str) -> Option<u64> {
        self.retry_after_at(client_key, Instant::now())
    }

    pub fn retry_after_at(&self, client_key: &str, now: Instant) -> Option<u64> {
        self.clients.get(client_key).map(|state| {
            let remaining = state.window_reset_at.saturating_duration_since(now);
            remaining.as_millis().div_ceil(1000) as u64
        })
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}

/// Derive the rate-limit key: first `X-Forwarded-For` hop, then the session
/// header, then the shared anonymous bucket.
pub fn client_key(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let session = headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    forwarded
        .or(session)
        .unwrap_or(ANONYMOUS_CLIENT)
        .to_string()
}

pub async fn rate_limit_middleware(
    State(limiter): State<SharedRateLimiter>,
    correlation_id: CorrelationId,
    request: Request,
    next: Next,
) -> Result<Response, CorrelatedError> {
    let key = client_key(request.headers());
    let now = Instant::now();

    if limiter.check_and_record_at(&key, now) {
        tracing::warn!(
            correlation_id = %correlation_id,
            client = %key,
            "Rate limit exceeded"
        );
        metrics::counter!("chat_proxy_rejections_total", "reason" => "rate_limited").increment(1);
        return Err(AppError::TooManyRequests(limiter.retry_after_at(&key, now))
            .correlate(&correlation_id));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_allows_up_to_limit_then_rejects() {
        let limiter = FixedWindowRateLimiter::new(30, Duration::from_millis(60_000));
        let now = Instant::now();

        for _ in 0..30 {
            assert!(!limiter.check_and_record_at("10.0.0.1", now));
        }
        assert!(limiter.check_and_record_at("10.0.0.1", now));
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let limiter = FixedWindowRateLimiter::new(30, Duration::from_millis(60_000));
        let start = Instant::now();

        for _ in 0..31 {
            limiter.check_and_record_at("10.0.0.1", start);
        }
        assert!(limiter.check_and_record_at("10.0.0.1", start + Duration::from_millis(60_000)));

        let later = start + Duration::from_millis(60_001);
        assert!(!limiter.check_and_record_at("10.0.0.1", later));
        assert_eq!(limiter.retry_after_at("10.0.0.1", later), Some(60));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = FixedWindowRateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();

        assert!(!limiter.check_and_record_at("a", now));
        assert!(limiter.check_and_record_at("a", now));
        assert!(!limiter.check_and_record_at("b", now));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let limiter = Arc::new(FixedWindowRateLimiter::new(1_000, Duration::from_secs(60)));
        let now = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        limiter.check_and_record_at("shared", now);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // 800 recorded, so 200 more fit before the 1001st is rejected.
        for _ in 0..200 {
            assert!(!limiter.check_and_record_at("shared", now));
        }
        assert!(limiter.check_and_record_at("shared", now));
    }

    #[test]
    fn test_client_key_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"));
        headers.insert(SESSION_ID_HEADER, HeaderValue::from_static("session-1"));
        assert_eq!(client_key(&headers), "203.0.113.7");
    }

    #[test]
    fn test_client_key_falls_back_to_session_then_anonymous() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers), ANONYMOUS_CLIENT);

        headers.insert(SESSION_ID_HEADER, HeaderValue::from_static("session-1"));
        assert_eq!(client_key(&headers), "session-1");
    }
}
