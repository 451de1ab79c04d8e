//! Run results and their classification
//!
//! When a run completes, the supervisor builds a [`Reason`] from the exit
//! status and the aggregated output of both streams, and classifies it into
//! exactly one [`Outcome`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Signal number conventionally used to ask a process to stop
pub const SIGTERM: i32 = 15;

/// How the child process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationKind {
    /// The process called exit (or returned from main)
    Exit,
    /// The process was killed by a signal
    Signal,
}

impl std::fmt::Display for TerminationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationKind::Exit => write!(f, "exit"),
            TerminationKind::Signal => write!(f, "signal"),
        }
    }
}

/// Raw classification input, captured once when a run completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reason {
    /// Exit or signal
    pub kind: TerminationKind,
    /// Exit code, or signal number when `kind` is [`TerminationKind::Signal`]
    pub code: i32,
    /// Aggregated stdout, `None` if the stream produced nothing
    pub stdout: Option<String>,
    /// Aggregated stderr, `None` if the stream produced nothing
    pub stderr: Option<String>,
}

impl Reason {
    /// Classify this reason into the outcome reported to callers.
    ///
    /// The first matching rule wins, so the order of the arms matters.
    pub fn into_outcome(self) -> Outcome {
        use TerminationKind::{Exit, Signal};

        let failure = match (self.kind, self.code, self.stdout, self.stderr) {
            (Exit, 0, Some(stdout), _) => return Outcome::Succeeded(stdout),
            (Exit, 0, None, Some(stderr)) => Failure::ZeroExitCodeWithStderr { stderr },
            (Exit, 0, None, None) => return Outcome::Succeeded(String::new()),
            (Signal, SIGTERM, None, stderr) => Failure::ManualTermination {
                stderr,
                signal: SIGTERM,
            },
            (Exit, 2, None, stderr) => Failure::SyntaxError { stderr, code: 2 },
            (Exit, 126, None, stderr) => Failure::NotExecutable { stderr, code: 126 },
            (Exit, 127, None, stderr) => Failure::PathNotFound { stderr, code: 127 },
            (Exit, code, None, stderr) => Failure::Generic { stderr, code },
            (Signal, signal, None, stderr) => Failure::UncaughtSignal { stderr, signal },
            (Exit, code, Some(stdout), Some(stderr)) => Failure::MixedOutput {
                stdout,
                stderr,
                code,
            },
            (Exit, code, Some(stdout), None) => Failure::WithStdout { stdout, code },
            (kind, code, stdout, stderr) => Failure::Fallback {
                kind,
                code,
                stdout,
                stderr,
            },
        };

        Outcome::Failed(failure)
    }
}

/// Why a run failed
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Failure {
    /// Exit code 0, but the script only wrote to stderr
    #[error("script exited with code 0 but only wrote to stderr")]
    ZeroExitCodeWithStderr {
        /// Captured stderr
        stderr: String,
    },

    /// The script was stopped with SIGTERM
    #[error("script was terminated by signal {signal}")]
    ManualTermination {
        /// Captured stderr
        stderr: Option<String>,
        /// Always [`SIGTERM`]
        signal: i32,
    },

    /// Shell reported misuse of a builtin or a syntax error
    #[error("syntax error (exit code {code})")]
    SyntaxError {
        /// Captured stderr
        stderr: Option<String>,
        /// Always 2
        code: i32,
    },

    /// The command was found but could not be executed
    #[error("command is not executable (exit code {code})")]
    NotExecutable {
        /// Captured stderr
        stderr: Option<String>,
        /// Always 126
        code: i32,
    },

    /// The command could not be found
    #[error("command not found (exit code {code})")]
    PathNotFound {
        /// Captured stderr
        stderr: Option<String>,
        /// Always 127
        code: i32,
    },

    /// Any other non-zero exit without stdout
    #[error("script exited with code {code}")]
    Generic {
        /// Captured stderr
        stderr: Option<String>,
        /// Exit code
        code: i32,
    },

    /// Killed by a signal other than SIGTERM
    #[error("script was killed by uncaught signal {signal}")]
    UncaughtSignal {
        /// Captured stderr
        stderr: Option<String>,
        /// Signal number
        signal: i32,
    },

    /// Non-zero exit with output on both streams
    #[error("script exited with code {code} and wrote to stdout and stderr")]
    MixedOutput {
        /// Captured stdout
        stdout: String,
        /// Captured stderr
        stderr: String,
        /// Exit code
        code: i32,
    },

    /// Non-zero exit with output on stdout only
    #[error("script exited with code {code}")]
    WithStdout {
        /// Captured stdout
        stdout: String,
        /// Exit code
        code: i32,
    },

    /// Combination no other rule covers
    #[error("script ended unexpectedly ({kind} {code})")]
    Fallback {
        /// Exit or signal
        kind: TerminationKind,
        /// Exit code or signal number
        code: i32,
        /// Captured stdout
        stdout: Option<String>,
        /// Captured stderr
        stderr: Option<String>,
    },
}

impl Failure {
    /// Exit code or signal number attached to the failure
    pub fn code(&self) -> Option<i32> {
        match self {
            Failure::ZeroExitCodeWithStderr { .. } => Some(0),
            Failure::ManualTermination { signal, .. }
            | Failure::UncaughtSignal { signal, .. } => Some(*signal),
            Failure::SyntaxError { code, .. }
            | Failure::NotExecutable { code, .. }
            | Failure::PathNotFound { code, .. }
            | Failure::Generic { code, .. }
            | Failure::MixedOutput { code, .. }
            | Failure::WithStdout { code, .. }
            | Failure::Fallback { code, .. } => Some(*code),
        }
    }

    /// Captured stderr, if any
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Failure::ZeroExitCodeWithStderr { stderr } | Failure::MixedOutput { stderr, .. } => {
                Some(stderr)
            }
            Failure::ManualTermination { stderr, .. }
            | Failure::SyntaxError { stderr, .. }
            | Failure::NotExecutable { stderr, .. }
            | Failure::PathNotFound { stderr, .. }
            | Failure::Generic { stderr, .. }
            | Failure::UncaughtSignal { stderr, .. }
            | Failure::Fallback { stderr, .. } => stderr.as_deref(),
            Failure::WithStdout { .. } => None,
        }
    }

    /// Captured stdout, if any
    pub fn stdout(&self) -> Option<&str> {
        match self {
            Failure::MixedOutput { stdout, .. } | Failure::WithStdout { stdout, .. } => {
                Some(stdout)
            }
            Failure::Fallback { stdout, .. } => stdout.as_deref(),
            _ => None,
        }
    }

    /// Whether this failure represents a stop request rather than an error
    pub fn is_manual_termination(&self) -> bool {
        matches!(self, Failure::ManualTermination { .. })
    }
}

/// Final result of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The script succeeded; carries the aggregated stdout
    Succeeded(String),
    /// The script failed
    Failed(Failure),
}

impl Outcome {
    /// Returns true for [`Outcome::Succeeded`]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded(_))
    }
}

/// One streamed fragment, tagged with the stream it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Piece {
    /// Fragment of stdout
    Succeeded(String),
    /// Fragment of stderr
    Failed(String),
}

impl Piece {
    /// The fragment text
    pub fn text(&self) -> &str {
        match self {
            Piece::Succeeded(text) | Piece::Failed(text) => text,
        }
    }
}
