//! Run state of a single execution
//!
//! The state is a set of flags that only ever grows within one run. Flags
//! are added through [`RunState::apply`] with a [`Transition`]; callers look
//! at the derived [`Phase`] and [`Verdict`] instead of testing flags.

/// Something that happened to a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The child process was launched
    Start,
    /// The stdout reader reached end-of-stream (or was closed)
    StdoutCompleted,
    /// The stderr reader reached end-of-stream (or was closed)
    StderrCompleted,
    /// The child process exited
    Terminated,
    /// The run was stopped on request or by SIGTERM
    ManualTermination,
    /// The outcome was delivered
    Published,
}

/// Monotonic run state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunState {
    started: bool,
    stdout_completed: bool,
    stderr_completed: bool,
    terminated: bool,
    manual_termination: bool,
    published: bool,
}

/// Where a run is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not launched yet
    NeverExecuted,
    /// Launched, still waiting for at least one completion signal
    Running,
    /// Stop requested, still waiting for at least one completion signal
    Stopping,
    /// All completion signals observed, outcome not delivered yet
    Completed,
    /// All completion signals observed after a stop request
    Stopped,
    /// Outcome delivered
    Published,
}

/// What the supervisor should do after a state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Keep waiting for completion signals
    Pending,
    /// Classify and deliver the outcome now
    Publish,
    /// Run is over but must not report an outcome
    Suppress,
    /// Outcome already delivered
    Settled,
}

impl RunState {
    /// A brand-new, never executed state
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the flag for `transition`. Flags are never removed.
    #[must_use]
    pub fn apply(mut self, transition: Transition) -> Self {
        match transition {
            Transition::Start => self.started = true,
            Transition::StdoutCompleted => self.stdout_completed = true,
            Transition::StderrCompleted => self.stderr_completed = true,
            Transition::Terminated => self.terminated = true,
            Transition::ManualTermination => self.manual_termination = true,
            Transition::Published => self.published = true,
        }
        self
    }

    /// Whether the flag for `transition` is set
    pub fn has(&self, transition: Transition) -> bool {
        match transition {
            Transition::Start => self.started,
            Transition::StdoutCompleted => self.stdout_completed,
            Transition::StderrCompleted => self.stderr_completed,
            Transition::Terminated => self.terminated,
            Transition::ManualTermination => self.manual_termination,
            Transition::Published => self.published,
        }
    }

    /// Launched at some point
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Process exited and both streams are done
    pub fn is_completed(&self) -> bool {
        self.terminated && self.stdout_completed && self.stderr_completed
    }

    /// Launched and the process has not exited yet
    pub fn is_running(&self) -> bool {
        self.started && !self.terminated
    }

    /// Stop was requested or SIGTERM observed
    pub fn is_manually_terminated(&self) -> bool {
        self.manual_termination
    }

    /// Outcome already delivered
    pub fn is_published(&self) -> bool {
        self.published
    }

    /// Derived lifecycle phase
    pub fn phase(&self) -> Phase {
        if self.published {
            Phase::Published
        } else if !self.started {
            Phase::NeverExecuted
        } else {
            match (self.is_completed(), self.manual_termination) {
                (false, false) => Phase::Running,
                (false, true) => Phase::Stopping,
                (true, false) => Phase::Completed,
                (true, true) => Phase::Stopped,
            }
        }
    }

    /// Decide what to do after a state change
    pub fn verdict(&self) -> Verdict {
        match self.phase() {
            Phase::NeverExecuted | Phase::Running | Phase::Stopping => Verdict::Pending,
            Phase::Completed => Verdict::Publish,
            Phase::Stopped => Verdict::Suppress,
            Phase::Published => Verdict::Settled,
        }
    }
}
