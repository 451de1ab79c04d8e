//! Events flowing into an execution's event loop

use serde::{Deserialize, Serialize};

use crate::process::ExitStatus;

/// Which output stream of the child something belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputSource {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

impl std::fmt::Display for OutputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputSource::Stdout => write!(f, "stdout"),
            OutputSource::Stderr => write!(f, "stderr"),
        }
    }
}

/// Input of the per-execution event loop
///
/// Read loops, the exit waiter and lifecycle calls all post into one
/// channel; the loop applies them one at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    /// Bytes read from one of the pipes
    Chunk(OutputSource, Vec<u8>),
    /// The pipe reached end-of-stream and was released
    Eof(OutputSource),
    /// The child process exited
    Exited(ExitStatus),
    /// Close both readers now, as part of a stop request
    ForceClose,
}
