//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses (listener, upstreams, metrics)
//! - Validate value ranges (timeouts > 0, worker permits > 0)
//! - Detect duplicate route names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::uri::Authority;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    InvalidBindAddress(String),
    InvalidMetricsAddress(String),
    InvalidUpstream { route: String, upstream: String },
    DuplicateRoute(String),
    EmptyRouteName,
    ZeroTimeout(&'static str),
    ZeroWorkerPermits,
    ZeroBodyLimit,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidBindAddress(a) => write!(f, "invalid listener bind address '{}'", a),
            ValidationError::InvalidMetricsAddress(a) => write!(f, "invalid metrics address '{}'", a),
            ValidationError::InvalidUpstream { route, upstream } => {
                write!(f, "route '{}' has invalid upstream '{}'", route, upstream)
            }
            ValidationError::DuplicateRoute(name) => write!(f, "route '{}' defined more than once", name),
            ValidationError::EmptyRouteName => write!(f, "route name must not be empty"),
            ValidationError::ZeroTimeout(which) => write!(f, "timeouts.{} must be greater than 0", which),
            ValidationError::ZeroWorkerPermits => write!(f, "rewrite.worker_permits must be greater than 0"),
            ValidationError::ZeroBodyLimit => write!(f, "rewrite.max_body_bytes must be greater than 0"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(config.listener.bind_address.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let mut seen = HashSet::new();
    for route in &config.routes {
        if route.name.trim().is_empty() {
            errors.push(ValidationError::EmptyRouteName);
        } else if !seen.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.name.clone()));
        }

        if Authority::from_str(&route.upstream).is_err() || route.upstream.is_empty() {
            errors.push(ValidationError::InvalidUpstream {
                route: route.name.clone(),
                upstream: route.upstream.clone(),
            });
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request_secs"));
    }

    if config.rewrite.worker_permits == 0 {
        errors.push(ValidationError::ZeroWorkerPermits);
    }
    if config.rewrite.max_body_bytes == Some(0) {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
