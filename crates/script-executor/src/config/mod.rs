//! YAML definitions of named scripts
//!
//! ```yaml
//! version: "1.0"
//! settings:
//!   shell: /bin/bash
//!   delimiter: "~~~\n"
//! scripts:
//!   hello:
//!     command: "echo"
//!     args: ["A"]
//!     env: { GREETING: "${USER:-world}" }
//! ```
//!
//! Values in `env` may reference the host environment with `${VAR}` or
//! `${VAR:-default}`. They are substituted when a script is resolved into a
//! [`ScriptCommand`], not when the file is parsed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use thiserror::Error;

use crate::command::ScriptCommand;

mod parser;

pub use parser::{parse_file, parse_str, substitute_env_vars};

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Environment variable not found
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    /// Script reference not found
    #[error("Script '{0}' not found")]
    ScriptNotFound(String),

    /// Substitution pattern could not be compiled
    #[error("Invalid substitution pattern: {0}")]
    PatternError(#[from] regex::Error),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Global settings
    #[serde(default, skip_serializing_if = "Settings::is_default")]
    pub settings: Settings,

    /// Script definitions by name
    pub scripts: BTreeMap<String, ScriptDefinition>,
}

/// Global settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Shell used for every script without its own
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<PathBuf>,

    /// Default piece delimiter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,

    /// Default log level for front ends
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Settings {
    fn is_default(&self) -> bool {
        self == &Settings::default()
    }
}

/// One named script
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScriptDefinition {
    /// Command string run through the shell
    pub command: String,

    /// Positional arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment overrides, may contain `${VAR}` references
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Piece delimiter, overrides the global setting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,

    /// Working directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl ScriptDefinition {
    /// Build a command from this definition, with settings as fallbacks
    pub fn to_command(&self, settings: &Settings) -> Result<ScriptCommand> {
        let mut command = ScriptCommand::new(self.command.clone());
        command.args(self.args.iter().cloned());

        for (key, value) in &self.env {
            command.env(key.clone(), substitute_env_vars(value)?);
        }

        if let Some(shell) = &settings.shell {
            command.shell(shell);
        }

        if let Some(delimiter) = self.delimiter.as_ref().or(settings.delimiter.as_ref()) {
            command.delimiter(delimiter.clone());
        }

        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        Ok(command)
    }
}

impl Config {
    /// Names of all defined scripts, sorted
    pub fn script_names(&self) -> impl Iterator<Item = &str> {
        self.scripts.keys().map(String::as_str)
    }

    /// Look up a script definition
    pub fn script(&self, name: &str) -> Result<&ScriptDefinition> {
        self.scripts
            .get(name)
            .ok_or_else(|| ConfigError::ScriptNotFound(name.to_string()))
    }

    /// Resolve a named script into a runnable command
    pub fn command(&self, name: &str) -> Result<ScriptCommand> {
        self.script(name)?.to_command(&self.settings)
    }
}
