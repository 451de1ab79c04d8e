//! Process supervision
//!
//! An [`Execution`] runs one [`ScriptCommand`] and reports what happens to
//! it through callbacks. Three independent sources feed it: the stdout read
//! loop, the stderr read loop and the exit waiter. They run as background
//! tasks and post [`Event`]s into one channel. The read loops are cancelled
//! once the streams are force-closed or the run has finished, so a
//! grandchild holding a pipe open cannot keep its handle alive. A single
//! event loop applies those events to the supervisor core, one at a time,
//! under a mutex. Once all three completion signals have been seen, in
//! whatever order, the run is classified and the outcome is published
//! exactly once.
//!
//! Callbacks are dispatched by the event loop only, after the core lock was
//! released. A callback may therefore call back into its execution.
//!
//! ```no_run
//! use script_executor::{Execution, ScriptCommand};
//!
//! let execution = Execution::new(ScriptCommand::new("echo Hello"));
//! execution
//!     .on_success(|stdout| println!("done: {stdout}"))
//!     .on_failure(|failure| eprintln!("failed: {failure}"));
//! execution.run()?;
//! # Ok::<(), script_executor::Error>(())
//! ```

use async_channel::{Receiver, Sender};
use futures_lite::io::AsyncRead;
use smol::Task;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

use crate::command::ScriptCommand;
use crate::error::{Error, Result};
use crate::event::{Event, OutputSource};
use crate::outcome::{Failure, Outcome, Reason};
use crate::process::{self, ExitStatus};
use crate::state::{Phase, RunState, Transition, Verdict};
use crate::stream::{self, StreamReader};

type TextCallback = Arc<dyn Fn(&str) + Send + Sync>;
type FailureCallback = Arc<dyn Fn(&Failure) + Send + Sync>;
type TerminationCallback = Arc<dyn Fn(&Reason) + Send + Sync>;

/// Registered callbacks
#[derive(Default, Clone)]
struct Subscribers {
    streamed_success: Vec<TextCallback>,
    streamed_failure: Vec<TextCallback>,
    success: Vec<TextCallback>,
    failure: Vec<FailureCallback>,
    termination: Vec<TerminationCallback>,
}

/// Something to hand to subscribers, produced while the core is locked
#[derive(Debug, Clone, PartialEq, Eq)]
enum Emission {
    Piece(OutputSource, String),
    Success(String),
    Failure(Failure),
    Termination(Reason),
}

/// Mutable state of one run
#[derive(Debug)]
struct Supervisor {
    state: RunState,
    stdout: StreamReader,
    stderr: StreamReader,
    status: Option<ExitStatus>,
    pid: Option<u32>,
    events: Option<Sender<Event>>,
    /// Stop requests for the exit waiter, which owns the unreaped child
    stop: Option<Sender<()>>,
    readers: Vec<Task<()>>,
    finished: bool,
}

impl Supervisor {
    fn new(delimiter: &str) -> Self {
        Self {
            state: RunState::new(),
            stdout: StreamReader::new(OutputSource::Stdout, delimiter),
            stderr: StreamReader::new(OutputSource::Stderr, delimiter),
            status: None,
            pid: None,
            events: None,
            stop: None,
            readers: Vec::new(),
            finished: false,
        }
    }

    fn reader_mut(&mut self, source: OutputSource) -> &mut StreamReader {
        match source {
            OutputSource::Stdout => &mut self.stdout,
            OutputSource::Stderr => &mut self.stderr,
        }
    }

    /// Apply one event and collect what has to be dispatched
    fn handle(&mut self, event: Event) -> Vec<Emission> {
        let mut emissions = Vec::new();

        match event {
            Event::Chunk(source, bytes) => {
                for piece in self.reader_mut(source).feed(&bytes) {
                    emissions.push(Emission::Piece(source, piece));
                }
            }
            Event::Eof(source) => self.complete_stream(source, &mut emissions),
            Event::Exited(status) => {
                debug!(pid = ?self.pid, ?status, "process exited");
                self.status = Some(status);

                if status.is_sigterm() {
                    self.transition(Transition::ManualTermination, &mut emissions);
                    self.close_streams(&mut emissions);
                }

                self.transition(Transition::Terminated, &mut emissions);
            }
            Event::ForceClose => self.close_streams(&mut emissions),
        }

        emissions
    }

    fn close_streams(&mut self, emissions: &mut Vec<Emission>) {
        self.complete_stream(OutputSource::Stdout, emissions);
        self.complete_stream(OutputSource::Stderr, emissions);
        self.cancel_readers();
    }

    /// Drop the read loops, releasing their pipe handles
    fn cancel_readers(&mut self) {
        if !self.readers.is_empty() {
            debug!(pid = ?self.pid, count = self.readers.len(), "cancelling read loops");
            self.readers.clear();
        }
    }

    /// Drain the tail of `source` and record its completion, once
    fn complete_stream(&mut self, source: OutputSource, emissions: &mut Vec<Emission>) {
        let Some(tail) = self.reader_mut(source).finish() else {
            return;
        };

        emissions.extend(tail.into_iter().map(|piece| Emission::Piece(source, piece)));

        let transition = match source {
            OutputSource::Stdout => Transition::StdoutCompleted,
            OutputSource::Stderr => Transition::StderrCompleted,
        };
        self.transition(transition, emissions);
    }

    fn transition(&mut self, transition: Transition, emissions: &mut Vec<Emission>) {
        let next = self.state.apply(transition);
        if next == self.state {
            return;
        }

        debug!(pid = ?self.pid, ?transition, "run state changed");
        self.state = next;
        self.evaluate(emissions);
    }

    /// Publish or suppress the outcome once the run is complete
    fn evaluate(&mut self, emissions: &mut Vec<Emission>) {
        match self.state.verdict() {
            Verdict::Pending => {}
            Verdict::Publish => {
                let reason = self.reason();
                match reason.clone().into_outcome() {
                    Outcome::Succeeded(stdout) => {
                        info!(pid = ?self.pid, "script succeeded");
                        emissions.push(Emission::Success(stdout));
                    }
                    Outcome::Failed(failure) => {
                        info!(pid = ?self.pid, %failure, "script failed");
                        emissions.push(Emission::Failure(failure));
                    }
                }
                self.state = self.state.apply(Transition::Published);
                self.finish(reason, emissions);
            }
            Verdict::Suppress => {
                info!(pid = ?self.pid, "script was stopped, outcome not published");
                let reason = self.reason();
                self.finish(reason, emissions);
            }
            Verdict::Settled => {
                debug!(pid = ?self.pid, "outcome already published");
            }
        }
    }

    fn finish(&mut self, reason: Reason, emissions: &mut Vec<Emission>) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.cancel_readers();
        emissions.push(Emission::Termination(reason));
    }

    fn reason(&self) -> Reason {
        let (kind, code) = self.status.unwrap_or(ExitStatus::UNKNOWN).termination();
        Reason {
            kind,
            code,
            stdout: self.stdout.full_text(),
            stderr: self.stderr.full_text(),
        }
    }
}

/// State shared between an [`Execution`] and its background tasks
struct Shared {
    core: Mutex<Supervisor>,
    subscribers: Mutex<Subscribers>,
}

impl Shared {
    fn new(delimiter: &str) -> Self {
        Self {
            core: Mutex::new(Supervisor::new(delimiter)),
            subscribers: Mutex::new(Subscribers::default()),
        }
    }

    fn core(&self) -> MutexGuard<'_, Supervisor> {
        lock(&self.core)
    }

    fn subscribers(&self) -> MutexGuard<'_, Subscribers> {
        lock(&self.subscribers)
    }

    /// Call subscribers for each emission, in order
    fn dispatch(&self, emissions: Vec<Emission>) {
        if emissions.is_empty() {
            return;
        }

        let subscribers = self.subscribers().clone();

        for emission in emissions {
            match emission {
                Emission::Piece(OutputSource::Stdout, piece) => {
                    for callback in &subscribers.streamed_success {
                        callback(&piece);
                    }
                }
                Emission::Piece(OutputSource::Stderr, piece) => {
                    for callback in &subscribers.streamed_failure {
                        callback(&piece);
                    }
                }
                Emission::Success(stdout) => {
                    for callback in &subscribers.success {
                        callback(&stdout);
                    }
                }
                Emission::Failure(failure) => {
                    for callback in &subscribers.failure {
                        callback(&failure);
                    }
                }
                Emission::Termination(reason) => {
                    for callback in &subscribers.termination {
                        callback(&reason);
                    }
                }
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Apply events until the run has finished
async fn event_loop(shared: Arc<Shared>, events: Receiver<Event>) {
    while let Ok(event) = events.recv().await {
        let (emissions, finished) = {
            let mut core = shared.core();
            let emissions = core.handle(event);
            (emissions, core.finished)
        };

        shared.dispatch(emissions);

        if finished {
            break;
        }
    }

    debug!("event loop stopped");
}

/// Start the read loop for one pipe of the child
fn arm_reader<R>(
    pid: u32,
    source: OutputSource,
    pipe: Option<R>,
    events: &Sender<Event>,
) -> Option<Task<()>>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    match pipe {
        Some(pipe) => Some(smol::spawn(stream::pump(source, pipe, events.clone()))),
        None => {
            warn!(pid, %source, "pipe not available, treating as closed");
            let _ = events.try_send(Event::Eof(source));
            None
        }
    }
}

/// What woke the exit waiter first
enum Wake {
    Exited(std::io::Result<std::process::ExitStatus>),
    Stop,
}

/// Wait for the child and report its exit status.
///
/// A stop request only becomes SIGTERM while the child is still unreaped,
/// so a recycled pid is never signalled.
async fn wait_for_exit(
    mut child: async_process::Child,
    events: Sender<Event>,
    stop: Receiver<()>,
) {
    let wake = smol::future::or(async { Wake::Exited(child.status().await) }, async {
        match stop.recv().await {
            Ok(()) => Wake::Stop,
            // Every sender is gone, only the exit can wake us
            Err(_) => std::future::pending().await,
        }
    })
    .await;

    let result = match wake {
        Wake::Exited(result) => result,
        Wake::Stop => {
            let pid = child.id();
            match child.try_status() {
                Ok(None) => {
                    if let Err(e) = process::terminate(pid) {
                        warn!(pid, error = %e, "failed to signal script");
                    }
                }
                Ok(Some(_)) => debug!(pid, "already exited, not signalling"),
                Err(e) => warn!(pid, error = %e, "cannot query script, not signalling"),
            }
            child.status().await
        }
    };
    // Late stop requests are refused from here on
    drop(stop);

    let status = match result {
        Ok(status) => ExitStatus::from(status),
        Err(e) => {
            error!(error = %e, "failed to wait for process");
            ExitStatus::UNKNOWN
        }
    };

    if events.send(Event::Exited(status)).await.is_err() {
        debug!("execution is gone before exit was delivered");
    }
}

/// One supervised run of a shell command
pub struct Execution {
    command: ScriptCommand,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Execution")
            .field("command", &self.command)
            .field("phase", &self.phase())
            .finish()
    }
}

impl Execution {
    /// Create an execution that has not been started yet
    pub fn new(command: ScriptCommand) -> Self {
        let shared = Arc::new(Shared::new(command.get_delimiter()));
        Self { command, shared }
    }

    /// The command this execution runs
    pub fn command(&self) -> &ScriptCommand {
        &self.command
    }

    /// Register a callback for every stdout piece
    pub fn on_streamed_success<F>(&self, callback: F) -> &Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.shared
            .subscribers()
            .streamed_success
            .push(Arc::new(callback));
        self
    }

    /// Register a callback for every stderr piece
    pub fn on_streamed_failure<F>(&self, callback: F) -> &Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.shared
            .subscribers()
            .streamed_failure
            .push(Arc::new(callback));
        self
    }

    /// Register a callback for a successful outcome; receives the whole stdout
    pub fn on_success<F>(&self, callback: F) -> &Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.shared.subscribers().success.push(Arc::new(callback));
        self
    }

    /// Register a callback for a failed outcome
    pub fn on_failure<F>(&self, callback: F) -> &Self
    where
        F: Fn(&Failure) + Send + Sync + 'static,
    {
        self.shared.subscribers().failure.push(Arc::new(callback));
        self
    }

    /// Register a callback for the end of the run.
    ///
    /// Fires once, after the outcome was published or suppressed, also for
    /// runs that were stopped.
    pub fn on_termination<F>(&self, callback: F) -> &Self
    where
        F: Fn(&Reason) + Send + Sync + 'static,
    {
        self.shared.subscribers().termination.push(Arc::new(callback));
        self
    }

    /// Drop every registered callback
    pub fn detach(&self) {
        *self.shared.subscribers() = Subscribers::default();
    }

    /// Launch the child process.
    ///
    /// Does nothing if this execution was already started. A spawn failure
    /// leaves the execution unstarted.
    pub fn run(&self) -> Result<()> {
        let mut core = self.shared.core();

        if core.state.is_started() {
            warn!(command = %self.command.get_command(), "execution already started");
            return Ok(());
        }

        let mut child = self.command.prepare().spawn().map_err(|e| {
            error!(command = %self.command.get_command(), error = %e, "failed to spawn script");
            Error::spawn_failed(e.to_string())
        })?;

        let pid = child.id();
        let (tx, rx) = async_channel::unbounded();
        let (stop_tx, stop_rx) = async_channel::bounded(1);

        core.state = core.state.apply(Transition::Start);
        core.pid = Some(pid);
        core.events = Some(tx.clone());
        core.stop = Some(stop_tx);

        info!(pid, command = %self.command.get_command(), "started script");

        let readers = [
            arm_reader(pid, OutputSource::Stdout, child.stdout.take(), &tx),
            arm_reader(pid, OutputSource::Stderr, child.stderr.take(), &tx),
        ];
        core.readers.extend(readers.into_iter().flatten());

        smol::spawn(wait_for_exit(child, tx, stop_rx)).detach();
        smol::spawn(event_loop(self.shared.clone(), rx)).detach();

        Ok(())
    }

    /// Stop the run.
    ///
    /// Both readers are closed right away, so their tails are still
    /// streamed, and no outcome is published. Returns `false` if the run was
    /// never started, was already stopped or has already published.
    pub fn terminate(&self) -> bool {
        let mut core = self.shared.core();

        if !core.state.is_started() {
            warn!(
                command = %self.command.get_command(),
                "cannot terminate, execution never started"
            );
            return false;
        }
        if core.state.is_manually_terminated() {
            warn!(pid = ?core.pid, "execution already terminated");
            return false;
        }
        if core.state.is_published() {
            warn!(pid = ?core.pid, "cannot terminate, outcome already published");
            return false;
        }

        core.state = core.state.apply(Transition::ManualTermination);
        info!(pid = ?core.pid, "terminating script");

        if let Some(events) = &core.events {
            if events.try_send(Event::ForceClose).is_err() {
                debug!(pid = ?core.pid, "event loop already stopped");
            }
        }

        if core.state.is_running() {
            if let Some(stop) = &core.stop {
                if stop.try_send(()).is_err() {
                    debug!(pid = ?core.pid, "exit waiter already done");
                }
            }
        }

        true
    }

    /// Forget the accumulated output of both streams
    pub fn clear(&self) {
        let mut core = self.shared.core();
        core.stdout.clear();
        core.stderr.clear();
    }

    /// Started and the process has not exited yet
    pub fn is_running(&self) -> bool {
        self.shared.core().state.is_running()
    }

    /// Stopped on request or by SIGTERM
    pub fn is_manually_terminated(&self) -> bool {
        self.shared.core().state.is_manually_terminated()
    }

    /// Stdout produced at least one piece
    pub fn is_stdout_streaming(&self) -> bool {
        self.shared.core().stdout.is_streaming()
    }

    /// Stderr produced at least one piece
    pub fn is_stderr_streaming(&self) -> bool {
        self.shared.core().stderr.is_streaming()
    }

    /// Process id of the child once started
    pub fn pid(&self) -> Option<u32> {
        self.shared.core().pid
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> Phase {
        self.shared.core().state.phase()
    }
}

impl Drop for Execution {
    fn drop(&mut self) {
        self.detach();
        if self.is_running() && !self.is_manually_terminated() {
            self.terminate();
        }
    }
}
