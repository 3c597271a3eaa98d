//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

pub use crate::rewrite::transform::TransformConfig;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Route definitions mapping requests to upstreams.
    pub routes: Vec<RouteConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Response body rewrite settings.
    pub rewrite: RewriteConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Route configuration mapping requests to one upstream.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Host header to match (exact match).
    pub host: Option<String>,

    /// Path prefix to match.
    pub path_prefix: Option<String>,

    /// Upstream address (e.g., "127.0.0.1:3000").
    pub upstream: String,

    /// Route priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,

    /// Body transform parameters; when present, response bodies on this
    /// route are rewritten.
    #[serde(default)]
    pub transform: Option<TransformConfig>,
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Response body rewrite configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Maximum codec jobs (decode/transform/encode) running at once.
    pub worker_permits: usize,

    /// Largest body that will be captured for rewriting, in bytes.
    /// Unbounded when absent.
    pub max_body_bytes: Option<usize>,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            worker_permits: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            max_body_bytes: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert!(config.routes.is_empty());
        assert_eq!(config.timeouts.request_secs, 30);
        assert!(config.rewrite.worker_permits >= 1);
        assert_eq!(config.rewrite.max_body_bytes, None);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_routes_with_and_without_transform() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [rewrite]
            worker_permits = 2
            max_body_bytes = 1048576

            [observability]
            log_format = "json"

            [[routes]]
            name = "shout"
            path_prefix = "/api"
            upstream = "127.0.0.1:3000"
            priority = 10
            transform = {}

            [[routes]]
            name = "plain"
            upstream = "127.0.0.1:3001"
            "#,
        )
        .unwrap();

        assert_eq!(config.rewrite.worker_permits, 2);
        assert_eq!(config.rewrite.max_body_bytes, Some(1024 * 1024));
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[0].transform, Some(TransformConfig::default()));
        assert_eq!(config.routes[0].priority, 10);
        assert_eq!(config.routes[1].transform, None);
        assert_eq!(config.routes[1].path_prefix, None);
    }

    #[test]
    fn test_unknown_transform_field_rejected() {
        let result: Result<GatewayConfig, _> = toml::from_str(
            r#"
            [[routes]]
            name = "bad"
            upstream = "127.0.0.1:3000"
            transform = { mode = "reverse" }
            "#,
        );
        assert!(result.is_err());
    }
}
