//! Process exit status and signalling

use crate::error::{Error, Result};
use crate::outcome::{SIGTERM, TerminationKind};

/// Process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    /// Exit code if the process exited normally
    pub code: Option<i32>,
    /// Signal that terminated the process (Unix only)
    pub signal: Option<i32>,
}

impl ExitStatus {
    /// Status used when waiting on the child failed and nothing is known
    pub const UNKNOWN: ExitStatus = ExitStatus {
        code: None,
        signal: None,
    };

    /// Returns true if the process exited successfully (code 0)
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Returns true if the process was terminated by a signal
    pub fn terminated_by_signal(&self) -> bool {
        self.signal.is_some()
    }

    /// Returns true if the process was stopped with SIGTERM
    pub fn is_sigterm(&self) -> bool {
        self.signal == Some(SIGTERM)
    }

    /// Kind and number used for classification.
    ///
    /// A status with neither code nor signal is reported as exit code -1.
    pub fn termination(&self) -> (TerminationKind, i32) {
        match (self.code, self.signal) {
            (_, Some(signal)) => (TerminationKind::Signal, signal),
            (Some(code), None) => (TerminationKind::Exit, code),
            (None, None) => (TerminationKind::Exit, -1),
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
            #[cfg(unix)]
            signal: {
                use std::os::unix::process::ExitStatusExt;
                status.signal()
            },
            #[cfg(not(unix))]
            signal: None,
        }
    }
}

/// Ask the process `pid` to stop with SIGTERM
#[cfg(unix)]
pub fn terminate(pid: u32) -> Result<()> {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let pid = Pid::from_raw(pid as i32);
    signal::kill(pid, Signal::SIGTERM).map_err(|e| Error::signal_failed(SIGTERM, e.to_string()))
}

/// Ask the process `pid` to stop with SIGTERM
#[cfg(not(unix))]
pub fn terminate(_pid: u32) -> Result<()> {
    Err(Error::signal_failed(
        SIGTERM,
        "signals are only supported on Unix",
    ))
}
