//! API server configuration.

use std::collections::HashMap;

/// Default request body ceiling (32 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 32 << 20;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8090").
    pub bind_addr: String,
    /// Request body limit in bytes for routes without an override.
    pub max_body_size: usize,
    /// Per-route body limits keyed by route path, e.g.
    /// `/api/collections/{collection}/confirm-email-change`.
    pub route_body_limits: HashMap<String, usize>,
    /// Derive the client key from `X-Forwarded-For` / `X-Real-IP`.
    ///
    /// Only enable behind a proxy that overwrites these headers.
    pub trust_proxy_headers: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8090".into(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            route_body_limits: HashMap::new(),
            trust_proxy_headers: false,
        }
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable              | Default          |
    /// |-----------------------|------------------|
    /// | `BIND_ADDR`           | `127.0.0.1:8090` |
    /// | `MAX_BODY_SIZE`       | `33554432`       |
    /// | `TRUST_PROXY_HEADERS` | `false`          |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_body_size),
            route_body_limits: defaults.route_body_limits,
            trust_proxy_headers: std::env::var("TRUST_PROXY_HEADERS")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes"))
                .unwrap_or(defaults.trust_proxy_headers),
        }
    }

    /// Body limit for `route`: its override, else `max_body_size`.
    pub fn body_limit_for(&self, route: &str) -> usize {
        self.route_body_limits
            .get(route)
            .copied()
            .unwrap_or(self.max_body_size)
    }
}
