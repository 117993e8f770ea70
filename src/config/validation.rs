//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the upstream URL and mount path
//! - Validate value ranges (capacity > 0, key length)
//! - Check names that are later turned into HTTP types
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// Minimum length of an accepted API key.
pub const MIN_API_KEY_LEN: usize = 16;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("upstream cannot be empty")]
    NoUpstream,

    #[error("upstream {url:?} is invalid: {reason}")]
    InvalidUpstream { url: String, reason: String },

    #[error("mount_path {0:?} must start with '/' and contain no route parameters")]
    InvalidMountPath(String),

    #[error("admission.max_concurrent_requests must be at least 1")]
    ZeroCapacity,

    #[error("authentication requires at least one API key or user")]
    NoCredentials,

    #[error("API keys must be at least {MIN_API_KEY_LEN} characters long")]
    ApiKeyTooShort,

    #[error("authentication.header_name {0:?} is not a valid header name")]
    InvalidHeaderName(String),

    #[error("unknown log level {0:?}")]
    InvalidLogLevel(String),

    #[error("{field} {value:?} is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = validate_upstream(&config.upstream) {
        errors.push(e);
    }

    if !valid_mount_path(&config.mount_path) {
        errors.push(ValidationError::InvalidMountPath(config.mount_path.clone()));
    }

    if config.admission.max_concurrent_requests == 0 {
        errors.push(ValidationError::ZeroCapacity);
    }

    let auth = &config.authentication;
    if auth.api_keys.is_empty() && auth.users.is_empty() {
        errors.push(ValidationError::NoCredentials);
    }
    if auth.api_keys.iter().any(|key| key.len() < MIN_API_KEY_LEN) {
        errors.push(ValidationError::ApiKeyTooShort);
    }
    if HeaderName::from_bytes(auth.header_name.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidHeaderName(auth.header_name.clone()));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// A mount path is an absolute literal path: no route captures, wildcards or
/// `:param` segments, which the router would refuse.
fn valid_mount_path(mount: &str) -> bool {
    mount.starts_with('/')
        && !mount.contains(['{', '}', '*'])
        && !mount.split('/').any(|segment| segment.starts_with(':'))
}

/// Check that the upstream is an http or https URL with a host.
pub fn validate_upstream(upstream: &str) -> Result<(), ValidationError> {
    if upstream.trim().is_empty() {
        return Err(ValidationError::NoUpstream);
    }

    let invalid = |reason: &str| ValidationError::InvalidUpstream {
        url: upstream.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(upstream).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("query and fragment are not allowed"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.upstream = "http://127.0.0.1:3000".to_string();
        config
            .authentication
            .api_keys
            .push("0123456789abcdef".to_string());
        config
    }

    #[test]
    fn accepts_minimal_config() {
        assert_eq!(validate_config(&valid_config()), Ok(()));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = valid_config();
        config.upstream = String::new();
        config.admission.max_concurrent_requests = 0;
        config.authentication.api_keys = vec!["short".to_string()];
        config.observability.log_level = "loud".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::NoUpstream));
        assert!(errors.contains(&ValidationError::ZeroCapacity));
        assert!(errors.contains(&ValidationError::ApiKeyTooShort));
        assert!(errors.contains(&ValidationError::InvalidLogLevel("loud".to_string())));
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn rejects_missing_credentials() {
        let mut config = valid_config();
        config.authentication.api_keys.clear();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NoCredentials]);

        config
            .authentication
            .users
            .insert("alice".to_string(), "pw".to_string());
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn rejects_bad_upstreams() {
        assert_eq!(validate_upstream("  "), Err(ValidationError::NoUpstream));
        assert!(validate_upstream("not a url").is_err());
        assert!(validate_upstream("ftp://example.com").is_err());
        assert!(validate_upstream("http://example.com/?a=b").is_err());
        assert!(validate_upstream("http://example.com/base").is_ok());
    }

    #[test]
    fn accepts_http_and_https_upstreams() {
        assert_eq!(validate_upstream("http://127.0.0.1:3000"), Ok(()));
        assert_eq!(validate_upstream("https://api.example.com"), Ok(()));
        assert_eq!(validate_upstream("https://api.example.com:8443/base/"), Ok(()));
    }

    #[test]
    fn rejects_bad_mount_and_header() {
        let mut config = valid_config();
        config.mount_path = "api".to_string();
        config.authentication.header_name = "bad header".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::InvalidMountPath("api".to_string())));
        assert!(errors.contains(&ValidationError::InvalidHeaderName("bad header".to_string())));

        config.mount_path = "/{*rest}".to_string();
        config.authentication.header_name = "X-API-Key".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::InvalidMountPath("/{*rest}".to_string())]);
    }

    #[test]
    fn rejects_colon_parameter_segments() {
        let mut config = valid_config();
        for mount in ["/:tenant", "/api/:version/", "/*rest"] {
            config.mount_path = mount.to_string();
            let errors = validate_config(&config).unwrap_err();
            assert_eq!(errors, vec![ValidationError::InvalidMountPath(mount.to_string())]);
        }

        config.mount_path = "/api/v1:beta".to_string();
        assert_eq!(validate_config(&config), Ok(()));
    }
}
