//! Configuration parser with environment variable substitution

use regex::{Captures, Regex};
use std::path::Path;
use tracing::debug;

use super::{Config, ConfigError, Result};

/// Parse a YAML configuration file
pub fn parse_file(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    debug!(path = %path.display(), "loading script configuration");
    let content = std::fs::read_to_string(path)?;
    parse_str(&content)
}

/// Parse YAML configuration from a string
pub fn parse_str(content: &str) -> Result<Config> {
    let config: Config = serde_yaml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.version != "1.0" {
        return Err(ConfigError::ValidationError(format!(
            "Unsupported version: {}, expected 1.0",
            config.version
        )));
    }

    if config.scripts.is_empty() {
        return Err(ConfigError::ValidationError(
            "No scripts defined".to_string(),
        ));
    }

    if config.settings.delimiter.as_deref() == Some("") {
        return Err(ConfigError::ValidationError(
            "Default delimiter must not be empty".to_string(),
        ));
    }

    for (name, script) in &config.scripts {
        if script.command.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Script '{}' has an empty command",
                name
            )));
        }

        if script.delimiter.as_deref() == Some("") {
            return Err(ConfigError::ValidationError(format!(
                "Script '{}' has an empty delimiter",
                name
            )));
        }
    }

    Ok(())
}

/// Substitute environment variables in a string
///
/// Supports `${VAR}` and `${VAR:-default}`. Every variable that is neither
/// set nor defaulted is reported in one error.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}")?;
    let mut missing = Vec::new();

    let result = re.replace_all(input, |cap: &Captures<'_>| {
        let expr = &cap[1];

        let (name, default) = match expr.split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (expr, None),
        };

        match (std::env::var(name), default) {
            (Ok(value), _) => value,
            (Err(_), Some(default)) => default.to_string(),
            (Err(_), None) => {
                missing.push(name.to_string());
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(ConfigError::EnvVarNotFound(missing.join(", ")));
    }

    Ok(result.into_owned())
}
