//! Origin allow-list resolution and CORS response headers.
//!
//! Unlike a plain allow/deny check, the policy always answers with exactly one
//! origin: the caller's own when it is allowed, otherwise the first configured
//! entry. Browsers reject the mismatch, and the header never widens to `*`.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use regex::Regex;
use std::sync::Arc;
use thiserror::Error;

const ALLOWED_METHODS: &str = "POST, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization, X-Session-Id, X-Request-Id";
const PREFLIGHT_MAX_AGE_SECS: &str = "86400";

#[derive(Debug, Error)]
pub enum CorsConfigError {
    #[error("allowed origin list is empty")]
    Empty,

    #[error("invalid origin pattern '{0}': {1}")]
    InvalidPattern(String, regex::Error),
}

#[derive(Debug)]
enum OriginMatcher {
    Exact(String),
    Wildcard(Regex),
}

impl OriginMatcher {
    fn parse(entry: &str) -> Result<Self, CorsConfigError> {
        if !entry.contains('*') {
            return Ok(OriginMatcher::Exact(entry.to_string()));
        }

        // Each `*` stands for one or more characters within a single URL segment.
        let body = entry
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("[^/]+");
        Regex::new(&format!("^{body}$"))
            .map(OriginMatcher::Wildcard)
            .map_err(|e| CorsConfigError::InvalidPattern(entry.to_string(), e))
    }

    fn matches(&self, origin: &str) -> bool {
        match self {
            OriginMatcher::Exact(allowed) => allowed == origin,
            OriginMatcher::Wildcard(pattern) => pattern.is_match(origin),
        }
    }
}

#[derive(Debug)]
pub struct CorsPolicy {
    entries: Vec<String>,
    matchers: Vec<OriginMatcher>,
}

impl CorsPolicy {
    pub fn new<I, S>(allowed_origins: I) -> Result<Self, CorsConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries: Vec<String> = allowed_origins
            .into_iter()
            .map(Into::into)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if entries.is_empty() {
            return Err(CorsConfigError::Empty);
        }

        let matchers = entries
            .iter()
            .map(|e| OriginMatcher::parse(e))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { entries, matchers })
    }

    /// Returns the single origin to echo for `request_origin`.
    pub fn resolve_allowed_origin<'a>(&'a self, request_origin: Option<&'a str>) -> &'a str {
        match request_origin {
            Some(origin) if self.matchers.iter().any(|m| m.matches(origin)) => origin,
            _ => &self.entries[0],
        }
    }

    pub fn allowed_origins(&self) -> &[String] {
        &self.entries
    }

    fn apply_headers(&self, request_origin: Option<&str>, headers: &mut HeaderMap) {
        let origin = self.resolve_allowed_origin(request_origin);
        match HeaderValue::from_str(origin) {
            Ok(value) => {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
            }
            Err(_) => {
                // Only reachable for a caller origin the patterns accepted but
                // which is not a valid header value; fall back to the default.
                if let Ok(value) = HeaderValue::from_str(&self.entries[0]) {
                    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
                }
            }
        }
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
}

pub type SharedCorsPolicy = Arc<CorsPolicy>;

/// Answers preflight requests directly and decorates every other response.
pub async fn cors_middleware(
    State(policy): State<SharedCorsPolicy>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        policy.apply_headers(origin.as_deref(), response.headers_mut());
        response.headers_mut().insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(PREFLIGHT_MAX_AGE_SECS),
        );
        return response;
    }

    let mut response = next.run(request).await;
    policy.apply_headers(origin.as_deref(), response.headers_mut());
    response
}
