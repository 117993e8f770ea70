//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the authentication proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Base URL of the single upstream service (e.g., "http://127.0.0.1:3000").
    pub upstream: String,

    /// Path prefix the gateway is mounted under. Never sent upstream.
    pub mount_path: String,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Concurrency ceiling for upstream calls.
    pub admission: AdmissionConfig,

    /// Shared-secret authentication settings.
    pub authentication: AuthenticationConfig,

    /// Outbound HTTP client settings.
    pub upstream_client: UpstreamClientConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            upstream: String::new(),
            mount_path: "/".to_string(),
            listener: ListenerConfig::default(),
            admission: AdmissionConfig::default(),
            authentication: AuthenticationConfig::default(),
            upstream_client: UpstreamClientConfig::default(),
            observability: ObservabilityConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Mount path without a trailing slash; the root mount is `/`.
    pub fn mount_prefix(&self) -> &str {
        let trimmed = self.mount_path.trim_end_matches('/');
        if trimmed.is_empty() {
            "/"
        } else {
            trimmed
        }
    }
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

/// Admission control configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Maximum number of requests in flight to the upstream.
    pub max_concurrent_requests: usize,

    /// How long a request may queue for a slot before receiving 429.
    /// Zero disables queueing entirely.
    pub queue_timeout_ms: u64,
}

impl AdmissionConfig {
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 100,
            queue_timeout_ms: 5_000,
        }
    }
}

/// Authentication configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthenticationConfig {
    /// Accepted shared secrets. Each must be at least 16 characters.
    pub api_keys: Vec<String>,

    /// Custom credential header, read on the way in and stripped on the way out.
    pub header_name: String,

    /// Optional Basic-Auth users (username -> password).
    pub users: BTreeMap<String, String>,

    /// Include a plain-text body in 401 responses.
    pub unauthorized_body: bool,
}

impl Default for AuthenticationConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            header_name: "X-API-Key".to_string(),
            users: BTreeMap::new(),
            unauthorized_body: false,
        }
    }
}

// Secrets stay out of logs and panic messages.
impl fmt::Debug for AuthenticationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationConfig")
            .field("api_keys", &format_args!("[{} redacted]", self.api_keys.len()))
            .field("header_name", &self.header_name)
            .field("users", &self.users.keys().collect::<Vec<_>>())
            .field("unauthorized_body", &self.unauthorized_body)
            .finish()
    }
}

/// Outbound client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamClientConfig {
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Time allowed for the upstream to return response headers, in milliseconds.
    pub response_timeout_ms: u64,

    /// Idle pooled connections are closed after this many seconds.
    pub pool_idle_timeout_secs: u64,
}

impl UpstreamClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

impl Default for UpstreamClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            response_timeout_ms: 30_000,
            pool_idle_timeout_secs: 90,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
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
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Maximum time to wait for in-flight requests to drain.
    pub grace_period_secs: u64,
}

impl ShutdownConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 30,
        }
    }
}
