//! Shell command description
//!
//! A [`ScriptCommand`] is a reusable, cloneable description of one script
//! invocation. It becomes an `async_process::Command` only when a run is
//! launched, so the same value can be run any number of times.
//!
//! The command string is handed to the shell as-is. Arguments are passed as
//! positional parameters and referenced from the command string, so the
//! child sees:
//!
//! ```text
//! /bin/bash -c "<command> \"$0\" \"$1\" ..." arg0 arg1 ...
//! ```

use async_process::{Command as AsyncCommand, Stdio};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::buffer::DEFAULT_DELIMITER;

/// Shell used when none is configured
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// A script to be executed through a shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptCommand {
    /// Command string passed to `<shell> -c`
    command: String,
    /// Positional arguments
    args: Vec<String>,
    /// Environment overrides on top of the host environment
    env: HashMap<String, String>,
    /// Working directory for the child
    current_dir: Option<PathBuf>,
    /// Shell executable
    shell: PathBuf,
    /// Piece delimiter for both output streams
    delimiter: String,
}

impl ScriptCommand {
    /// Create a command with no arguments, default shell and delimiter
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            current_dir: None,
            shell: PathBuf::from(DEFAULT_SHELL),
            delimiter: DEFAULT_DELIMITER.to_string(),
        }
    }

    /// Add a positional argument
    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple positional arguments
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// Override an environment variable
    pub fn env(&mut self, key: impl Into<String>, val: impl Into<String>) -> &mut Self {
        self.env.insert(key.into(), val.into());
        self
    }

    /// Override multiple environment variables
    pub fn envs<I, K, V>(&mut self, vars: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, val) in vars {
            self.env(key, val);
        }
        self
    }

    /// Set the working directory
    pub fn current_dir(&mut self, dir: impl AsRef<Path>) -> &mut Self {
        self.current_dir = Some(dir.as_ref().to_owned());
        self
    }

    /// Use another shell than `/bin/bash`
    pub fn shell(&mut self, shell: impl AsRef<Path>) -> &mut Self {
        self.shell = shell.as_ref().to_owned();
        self
    }

    /// Set the piece delimiter
    pub fn delimiter(&mut self, delimiter: impl Into<String>) -> &mut Self {
        self.delimiter = delimiter.into();
        self
    }

    /// The raw command string
    pub fn get_command(&self) -> &str {
        &self.command
    }

    /// Positional arguments
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Environment overrides
    pub fn get_envs(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// Working directory, if any
    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Shell executable
    pub fn get_shell(&self) -> &Path {
        &self.shell
    }

    /// Piece delimiter
    pub fn get_delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Arguments handed to the shell executable
    pub fn shell_arguments(&self) -> Vec<String> {
        let mut script = self.command.clone();
        for index in 0..self.args.len() {
            script.push_str(&format!(" \"${index}\""));
        }

        let mut arguments = Vec::with_capacity(self.args.len() + 2);
        arguments.push("-c".to_string());
        arguments.push(script);
        arguments.extend(self.args.iter().cloned());
        arguments
    }

    /// Build the `async_process::Command` for one run.
    ///
    /// The host environment is inherited, overrides win. Both output
    /// streams are piped, stdin is closed.
    pub fn prepare(&self) -> AsyncCommand {
        let mut cmd = AsyncCommand::new(&self.shell);

        cmd.args(self.shell_arguments())
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        cmd
    }
}

impl ScriptCommand {
    /// Create a builder for chained construction
    pub fn builder(command: impl Into<String>) -> ScriptCommandBuilder {
        ScriptCommandBuilder(ScriptCommand::new(command))
    }
}

/// Owned builder for [`ScriptCommand`]
pub struct ScriptCommandBuilder(ScriptCommand);

impl ScriptCommandBuilder {
    /// Add an argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.0.arg(arg);
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.args(args);
        self
    }

    /// Override an environment variable
    pub fn env(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.0.env(key, val);
        self
    }

    /// Override multiple environment variables
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.0.envs(vars);
        self
    }

    /// Set the working directory
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.0.current_dir(dir);
        self
    }

    /// Set the shell
    pub fn shell(mut self, shell: impl AsRef<Path>) -> Self {
        self.0.shell(shell);
        self
    }

    /// Set the piece delimiter
    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.0.delimiter(delimiter);
        self
    }

    /// Build the command
    pub fn build(self) -> ScriptCommand {
        self.0
    }
}
