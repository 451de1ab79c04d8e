//! Shell script supervision
//!
//! This crate runs a command through a shell, frames its stdout and stderr
//! into pieces on a delimiter as the bytes arrive, and reports exactly one
//! classified outcome per run, no matter in which order the end of both
//! streams and the exit of the process are observed.
//!
//! - [`Execution`] supervises a single run and exposes callbacks.
//! - [`Script`] is a restartable facade that forwards results to a
//!   [`Scriptable`] delegate.
//! - [`config`] loads named scripts from YAML.

#![warn(missing_docs)]

pub mod buffer;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod execution;
pub mod outcome;
pub mod process;
pub mod script;
pub mod state;
pub mod stream;

pub use buffer::{DEFAULT_DELIMITER, FramingBuffer};
pub use command::{DEFAULT_SHELL, ScriptCommand, ScriptCommandBuilder};
pub use config::{Config, ConfigError, ScriptDefinition, Settings};
pub use error::{Error, Result};
pub use event::OutputSource;
pub use execution::Execution;
pub use outcome::{Failure, Outcome, Piece, Reason, TerminationKind};
pub use process::ExitStatus;
pub use script::{Script, Scriptable};
pub use state::{Phase, RunState, Transition, Verdict};
pub use stream::{ReaderState, StreamReader};
