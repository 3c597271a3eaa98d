//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up matching route for request
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in priority order (acceptable for typical route counts)
//! - Ties keep declaration order
//! - Explicit `None` rather than silent default

use std::str::FromStr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::uri::Authority;
use axum::http::Request;

use crate::config::RouteConfig;
use crate::rewrite::TransformConfig;
use crate::routing::matcher::{AndMatcher, HostMatcher, Matcher, PathPrefixMatcher};

/// A compiled route.
#[derive(Debug)]
pub struct Route {
    pub name: Arc<str>,
    pub upstream: Authority,
    pub priority: u32,
    pub transform: Option<Arc<TransformConfig>>,
    matcher: AndMatcher,
}

impl Route {
    /// Compile a route from its configuration.
    ///
    /// Fails only when the upstream is not a valid `host:port` authority.
    pub fn compile(config: RouteConfig) -> Result<Self, axum::http::uri::InvalidUri> {
        let upstream = Authority::from_str(&config.upstream)?;

        let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();
        if let Some(host) = config.host {
            matchers.push(Box::new(HostMatcher::new(host)));
        }
        if let Some(prefix) = config.path_prefix {
            matchers.push(Box::new(PathPrefixMatcher::new(prefix)));
        }

        Ok(Self {
            name: Arc::from(config.name),
            upstream,
            priority: config.priority,
            transform: config.transform.map(Arc::new),
            matcher: AndMatcher::new(matchers),
        })
    }

    pub fn matches(&self, req: &Request<Body>) -> bool {
        self.matcher.matches(req)
    }
}

/// Immutable route table.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Compile routes, highest priority first.
    pub fn from_config(configs: Vec<RouteConfig>) -> Self {
        let mut routes: Vec<Route> = configs
            .into_iter()
            .filter_map(|config| {
                let name = config.name.clone();
                let upstream = config.upstream.clone();
                match Route::compile(config) {
                    Ok(route) => Some(route),
                    Err(e) => {
                        tracing::warn!(route = %name, upstream = %upstream, error = %e, "Skipping route with invalid upstream");
                        None
                    }
                }
            })
            .collect();

        // Stable sort keeps declaration order within a priority.
        routes.sort_by(|a, b| b.priority.cmp(&a.priority));

        tracing::debug!(routes = routes.len(), "Route table compiled");
        Self { routes }
    }

    /// First route matching the request, if any.
    pub fn match_request(&self, req: &Request<Body>) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(req))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
