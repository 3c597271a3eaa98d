//! Route matching logic.
//!
//! # Responsibilities
//! - Match the request host (case-insensitive, port ignored)
//! - Match path prefix on segment boundaries (case-sensitive)
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Host comes from the `Host` header, else from the URI authority (HTTP/2)
//! - `/api` matches `/api` and `/api/x`, never `/apix`
//! - Empty condition = always matches (wildcard)
//! - No regex to guarantee O(n) matching

use axum::body::Body;
use axum::http::header::HOST;
use axum::http::Request;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &Request<Body>) -> bool;
}

/// Matches the request host.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    expected_host: String,
}

impl HostMatcher {
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            expected_host: host.into().to_ascii_lowercase(),
        }
    }
}

/// Host of the request without any port.
fn request_host(req: &Request<Body>) -> Option<&str> {
    let raw = req
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().host())?;

    // Bracketed IPv6 literals keep their colons.
    if raw.starts_with('[') {
        return raw.split_inclusive(']').next();
    }
    raw.split(':').next()
}

impl Matcher for HostMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        request_host(req)
            .map(|h| h.eq_ignore_ascii_case(&self.expected_host))
            .unwrap_or(false)
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Trailing slashes are dropped, so `/api/` and `/api` behave the same.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        match req.uri().path().strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// Combines multiple matchers with AND semantics.
///
/// An empty matcher list matches every request.
#[derive(Debug, Default)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    pub fn is_wildcard(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        self.matchers.iter().all(|m| m.matches(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(uri: &str, host: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(host) = host {
            builder = builder.header("Host", host);
        }
        builder.body(Body::default()).unwrap()
    }

    #[test]
    fn test_host_matcher() {
        let matcher = HostMatcher::new("Example.com");

        assert!(matcher.matches(&get("/", Some("example.com"))));
        assert!(matcher.matches(&get("/", Some("EXAMPLE.COM:8080"))));
        assert!(!matcher.matches(&get("/", Some("other.com"))));
        assert!(!matcher.matches(&get("/", None)));
    }

    #[test]
    fn test_host_from_authority() {
        let matcher = HostMatcher::new("example.com");
        assert!(matcher.matches(&get("http://example.com:9000/x", None)));
    }

    #[test]
    fn test_ipv6_host() {
        let matcher = HostMatcher::new("[::1]");
        assert!(matcher.matches(&get("/", Some("[::1]:8080"))));
    }

    #[test]
    fn test_path_matcher_segments() {
        let matcher = PathPrefixMatcher::new("/api/");

        assert!(matcher.matches(&get("http://example.com/api", None)));
        assert!(matcher.matches(&get("http://example.com/api/v1", None)));
        assert!(!matcher.matches(&get("http://example.com/apix", None)));
        assert!(!matcher.matches(&get("http://example.com/images", None)));

        let root = PathPrefixMatcher::new("/");
        assert!(root.matches(&get("/anything", None)));
    }

    #[test]
    fn test_and_matcher() {
        let matcher = AndMatcher::new(vec![
            Box::new(HostMatcher::new("api.example.com")),
            Box::new(PathPrefixMatcher::new("/v1")),
        ]);

        assert!(matcher.matches(&get("/v1/users", Some("api.example.com"))));
        assert!(!matcher.matches(&get("/v2/users", Some("api.example.com"))));

        let wildcard = AndMatcher::default();
        assert!(wildcard.is_wildcard());
        assert!(wildcard.matches(&get("/v2/users", None)));
    }
}
