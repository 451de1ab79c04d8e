//! Restartable script facade
//!
//! [`Script`] keeps one [`ScriptCommand`] and a delegate, and creates a
//! fresh [`Execution`] for every start. Results of a run are forwarded to
//! the delegate as long as that run is the current one. Runs that were
//! stopped report nothing but their pieces.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use crate::command::ScriptCommand;
use crate::config::{ScriptDefinition, Settings};
use crate::error::Result;
use crate::execution::Execution;
use crate::outcome::{Failure, Piece};

/// Receiver of script results
pub trait Scriptable: Send + Sync {
    /// The script succeeded with this stdout
    fn receive_success(&self, stdout: &str);

    /// The script failed. Never called for runs that were stopped.
    fn receive_failure(&self, failure: &Failure);

    /// A piece of output was streamed
    fn receive_piece(&self, _piece: &Piece) {}
}

/// Routes callbacks of one run to the delegate while that run is current
#[derive(Clone)]
struct Route {
    delegate: Arc<dyn Scriptable>,
    current: Arc<AtomicU64>,
    run: u64,
}

impl Route {
    fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.run
    }

    fn wire(self, execution: &Execution) {
        let route = self.clone();
        execution.on_streamed_success(move |text| {
            if route.is_current() {
                route
                    .delegate
                    .receive_piece(&Piece::Succeeded(text.to_string()));
            }
        });

        let route = self.clone();
        execution.on_streamed_failure(move |text| {
            if route.is_current() {
                route.delegate.receive_piece(&Piece::Failed(text.to_string()));
            }
        });

        let route = self.clone();
        execution.on_success(move |stdout| {
            if route.is_current() {
                route.delegate.receive_success(stdout);
            }
        });

        let route = self;
        execution.on_failure(move |failure| {
            if failure.is_manual_termination() {
                debug!("not forwarding manual termination");
            } else if route.is_current() {
                route.delegate.receive_failure(failure);
            }
        });
    }
}

/// A script that can be started, stopped and restarted
pub struct Script {
    command: ScriptCommand,
    delegate: Option<Arc<dyn Scriptable>>,
    execution: Option<Execution>,
    current: Arc<AtomicU64>,
}

impl std::fmt::Debug for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Script")
            .field("command", &self.command)
            .field("execution", &self.execution)
            .field("has_delegate", &self.delegate.is_some())
            .finish()
    }
}

impl Script {
    /// Create a script for a shell command string
    pub fn new(command: impl Into<String>) -> Self {
        Self::from_command(ScriptCommand::new(command))
    }

    /// Create a script from a prepared command
    pub fn from_command(command: ScriptCommand) -> Self {
        Self {
            command,
            delegate: None,
            execution: None,
            current: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a script from a configured definition
    pub fn from_definition(definition: &ScriptDefinition, settings: &Settings) -> Result<Self> {
        Ok(Self::from_command(definition.to_command(settings)?))
    }

    /// Set positional arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command.args(args);
        self
    }

    /// Add environment overrides
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.command.envs(vars);
        self
    }

    /// Set the piece delimiter
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.command.delimiter(delimiter);
        self
    }

    /// Set the delegate receiving results
    pub fn with_delegate(mut self, delegate: Arc<dyn Scriptable>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// The command every run executes
    pub fn command(&self) -> &ScriptCommand {
        &self.command
    }

    /// The execution of the current or last run
    pub fn execution(&self) -> Option<&Execution> {
        self.execution.as_ref()
    }

    /// Running and not being stopped
    pub fn is_running(&self) -> bool {
        self.execution
            .as_ref()
            .is_some_and(|e| e.is_running() && !e.is_manually_terminated())
    }

    /// Start a new run.
    ///
    /// Does nothing while a run is in progress. The previous execution, if
    /// any, is retired first so none of its callbacks reach the delegate
    /// anymore.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            debug!(command = %self.command.get_command(), "script already running");
            return Ok(());
        }

        self.retire();

        let run = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        let execution = Execution::new(self.command.clone());

        if let Some(delegate) = &self.delegate {
            Route {
                delegate: delegate.clone(),
                current: self.current.clone(),
                run,
            }
            .wire(&execution);
        }

        execution.run()?;
        info!(run, pid = ?execution.pid(), "script started");
        self.execution = Some(execution);

        Ok(())
    }

    /// Stop the current run without reporting an outcome
    pub fn stop(&mut self) {
        match &self.execution {
            Some(execution) if execution.is_running() => {
                execution.terminate();
            }
            _ => debug!(command = %self.command.get_command(), "script is not running"),
        }
    }

    /// Stop the current run and start a new one
    pub fn restart(&mut self) -> Result<()> {
        self.stop();
        self.start()
    }

    fn retire(&mut self) {
        if let Some(previous) = self.execution.take() {
            previous.detach();
            if previous.is_running() && !previous.is_manually_terminated() {
                previous.terminate();
            }
        }
    }
}
