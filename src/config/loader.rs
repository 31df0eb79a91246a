//! Configuration loading from disk and environment.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::RelayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding the listener port.
pub const PORT_ENV: &str = "PORT";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply environment
/// overrides, then validate.
pub fn load_config(path: Option<&Path>) -> Result<RelayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path).map_err(ConfigError::Io)?)?,
        None => RelayConfig::default(),
    };

    apply_port_override(&mut config, std::env::var(PORT_ENV).ok().as_deref());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse TOML text into a configuration (no validation).
pub fn parse_config(content: &str) -> Result<RelayConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::Parse)
}

/// Replace the listener port with `port`, if it is a valid port number.
pub fn apply_port_override(config: &mut RelayConfig, port: Option<&str>) {
    let Some(port) = port else {
        return;
    };

    let (Ok(port), Ok(mut addr)) = (
        port.trim().parse::<u16>(),
        config.listener.bind_address.parse::<SocketAddr>(),
    ) else {
        tracing::warn!(port = %port, "Ignoring unusable PORT override");
        return;
    };

    addr.set_port(port);
    config.listener.bind_address = addr.to_string();
}
