//! Configuration loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Default locations searched when no explicit path is given, in order.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "/etc/authentication-proxy/config.toml",
    "config.toml",
];

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "PROXY_";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to read {var} from {}: {source}", .path.display())]
    EnvFile {
        var: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

impl From<ValidationError> for ConfigError {
    fn from(err: ValidationError) -> Self {
        ConfigError::Validation(vec![err])
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, override from the process environment, and validate.
///
/// With an explicit path the file must exist. Otherwise the default locations
/// are searched and, if none exists, the environment alone supplies settings.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => match DEFAULT_CONFIG_PATHS.iter().map(Path::new).find(|p| p.is_file()) {
            Some(found) => read_config_file(found)?,
            None => {
                tracing::info!("No config file found, using defaults and environment");
                ProxyConfig::default()
            }
        },
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Read and deserialize a TOML file without validating it.
pub fn read_config_file(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(path = %path.display(), "Config file loaded");
    Ok(config)
}

/// Deserialize configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ProxyConfig, toml::de::Error> {
    toml::from_str(content)
}

/// Apply `PROXY_*` overrides using the given variable lookup.
///
/// Secret-bearing variables may instead name a file through a `_FILE` suffix.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |suffix: &str| {
        lookup(&format!("{ENV_PREFIX}{suffix}")).filter(|value| !value.is_empty())
    };

    if let Some(upstream) = var("UPSTREAM") {
        config.upstream = upstream;
    }
    if let Some(mount_path) = var("MOUNT_PATH") {
        config.mount_path = mount_path;
    }
    if let Some(level) = var("LOG_LEVEL") {
        config.observability.log_level = level;
    }
    if let Some(bind) = var("LISTENER_BIND_ADDRESS") {
        config.listener.bind_address = bind;
    }

    if let Some(keys) = secret_var(&lookup, "AUTHENTICATION_API_KEYS")? {
        config.authentication.api_keys = split_list(&keys).map(str::to_string).collect();
    }

    if let Some(users) = secret_var(&lookup, "AUTHENTICATION_USERS")? {
        config.authentication.users = split_list(&users)
            .filter_map(|pair| pair.split_once(':'))
            .map(|(user, password)| (user.to_string(), password.to_string()))
            .collect();
    }

    Ok(())
}

/// Resolve `PROXY_<NAME>`, falling back to the file named by `PROXY_<NAME>_FILE`.
fn secret_var<F>(lookup: &F, name: &str) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = format!("{ENV_PREFIX}{name}");
    if let Some(value) = lookup(&var).filter(|v| !v.is_empty()) {
        return Ok(Some(value));
    }

    let file_var = format!("{var}_FILE");
    let Some(file) = lookup(&file_var).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    let path = PathBuf::from(file);
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::EnvFile {
        var: file_var,
        path,
        source,
    })?;
    Ok(Some(content.trim().to_string()))
}

/// Split on commas and whitespace, dropping empty entries.
fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|item| !item.is_empty())
}
