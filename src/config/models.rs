//! Configuration data structures for Junction.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files. Routes
//! are an ordered list so the file order is the registration order.
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_upstream_timeout() -> String {
    "30s".to_string()
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_status_path() -> String {
    "/_junction/status".to_string()
}

/// Output format for log lines
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
    /// Include span context in JSON output
    pub include_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            include_spans: true,
        }
    }
}

/// A single route entry.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    /// Path template, e.g. `/api/*`
    pub pattern: String,
    /// Absolute upstream URI, e.g. `http://backend:8080`
    pub target: String,
    /// Replacement for the pattern's literal prefix
    #[serde(default)]
    pub rewrite: Option<String>,
}

impl RouteConfig {
    pub fn new(pattern: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            target: target.into(),
            rewrite: None,
        }
    }

    pub fn with_rewrite(mut self, rewrite: impl Into<String>) -> Self {
        self.rewrite = Some(rewrite.into());
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Upper bound for one upstream exchange, parsed by humantime ("500ms", "30s")
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout: String,
    /// Inbound bodies larger than this are refused with 413
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Methods accepted by the gateway; empty accepts all
    #[serde(default)]
    pub allowed_methods: Vec<String>,
    /// Path answered by the gateway itself with route table status
    #[serde(default = "default_status_path")]
    pub status_path: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl ServerConfig {
    /// Create a new server configuration builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Parsed upstream timeout.
    pub fn upstream_timeout(&self) -> Result<Duration, humantime::DurationError> {
        humantime::parse_duration(&self.upstream_timeout)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            upstream_timeout: default_upstream_timeout(),
            max_body_bytes: default_max_body_bytes(),
            allowed_methods: Vec::new(),
            status_path: default_status_path(),
            logging: LoggingConfig::default(),
            routes: Vec::new(),
        }
    }
}

/// Builder for ServerConfig to allow for cleaner configuration creation
#[derive(Default)]
pub struct ServerConfigBuilder {
    listen_addr: Option<String>,
    upstream_timeout: Option<String>,
    max_body_bytes: Option<usize>,
    allowed_methods: Vec<String>,
    status_path: Option<String>,
    logging: Option<LoggingConfig>,
    routes: Vec<RouteConfig>,
}

impl ServerConfigBuilder {
    /// Set the listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    pub fn upstream_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.upstream_timeout = Some(timeout.into());
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = Some(limit);
        self
    }

    pub fn allow_method(mut self, method: impl Into<String>) -> Self {
        self.allowed_methods.push(method.into());
        self
    }

    pub fn status_path(mut self, path: impl Into<String>) -> Self {
        self.status_path = Some(path.into());
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Append a route; routes keep the order they are added in
    pub fn route(mut self, route: RouteConfig) -> Self {
        self.routes.push(route);
        self
    }

    /// Build the final ServerConfig
    pub fn build(self) -> Result<ServerConfig, String> {
        let listen_addr = self
            .listen_addr
            .ok_or_else(|| "listen_addr is required".to_string())?;

        Ok(ServerConfig {
            listen_addr,
            upstream_timeout: self
                .upstream_timeout
                .unwrap_or_else(default_upstream_timeout),
            max_body_bytes: self.max_body_bytes.unwrap_or_else(default_max_body_bytes),
            allowed_methods: self.allowed_methods,
            status_path: self.status_path.unwrap_or_else(default_status_path),
            logging: self.logging.unwrap_or_default(),
            routes: self.routes,
        })
    }
}
