use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Proxy prefix '{prefix}' must be a single non-empty path segment")]
    InvalidProxyPrefix { prefix: String },

    #[error("Proxy prefix '{prefix}' collides with a built-in route")]
    ReservedProxyPrefix { prefix: String },

    #[error("Invalid remote base URL '{url}', expected 'http://' or 'https://'")]
    InvalidRemoteScheme { url: String },

    #[error("Timeout must be positive: {field} = {value}")]
    InvalidTimeout { field: String, value: u64 },

    #[error("Bind port must not be 0 (the supervisor needs a fixed dashboard URL)")]
    EphemeralPort,

    #[error("max_upload_bytes must be positive")]
    InvalidUploadLimit,
}

/// Route prefixes already taken by the worker router.
const RESERVED_PREFIXES: &[&str] = &["api", "task", "uc", "health"];

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_server(config)?;
    validate_storage(config)?;
    validate_remote(config)?;
    validate_timeouts(config)?;
    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    if config.server.bind_addr.port() == 0 {
        return Err(ValidationError::EphemeralPort);
    }

    if config.server.max_upload_bytes == 0 {
        return Err(ValidationError::InvalidUploadLimit);
    }

    Ok(())
}

/// The prefix becomes a route segment and part of every local reference path.
fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    let prefix = &config.storage.proxy_prefix;

    let well_formed = !prefix.is_empty()
        && prefix != "."
        && prefix != ".."
        && prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if !well_formed {
        return Err(ValidationError::InvalidProxyPrefix {
            prefix: prefix.clone(),
        });
    }

    if RESERVED_PREFIXES.contains(&prefix.as_str()) {
        return Err(ValidationError::ReservedProxyPrefix {
            prefix: prefix.clone(),
        });
    }

    Ok(())
}

fn validate_remote(config: &Config) -> Result<(), ValidationError> {
    let url = &config.remote.base_url;
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ValidationError::InvalidRemoteScheme { url: url.clone() });
    }
    Ok(())
}

fn validate_timeouts(config: &Config) -> Result<(), ValidationError> {
    let checks = [
        ("remote.connect_timeout_secs", config.remote.connect_timeout_secs),
        ("remote.request_timeout_secs", config.remote.request_timeout_secs),
        ("control.drain_timeout_ms", config.control.drain_timeout_ms),
    ];

    for (field, value) in checks {
        if value == 0 {
            return Err(ValidationError::InvalidTimeout {
                field: field.to_string(),
                value,
            });
        }
    }

    Ok(())
}
