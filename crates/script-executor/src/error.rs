//! Error types for script execution

use thiserror::Error;

use crate::config::ConfigError;

/// Unified error type for script execution
///
/// These are operational errors returned from the API. Classified run
/// failures (non-zero exit, signals, ...) are not errors of this kind; they
/// are delivered as [`Failure`](crate::outcome::Failure) outcomes.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to spawn the shell process
    #[error("failed to spawn process: {reason}")]
    SpawnFailed {
        /// The reason for the spawn failure
        reason: String,
    },

    /// Failed to send signal to process
    #[error("failed to send signal {signal}: {reason}")]
    SignalFailed {
        /// The signal number that failed to send
        signal: i32,
        /// The reason for the signal failure
        reason: String,
    },

    /// Script configuration could not be loaded or resolved
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Nix error (Unix signal handling)
    #[cfg(unix)]
    #[error(transparent)]
    Nix(#[from] nix::Error),
}

impl Error {
    /// Create a spawn failed error
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            reason: reason.into(),
        }
    }

    /// Create a signal failed error
    pub fn signal_failed(signal: i32, reason: impl Into<String>) -> Self {
        Self::SignalFailed {
            signal,
            reason: reason.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
