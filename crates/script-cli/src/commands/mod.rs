pub mod exec;
pub mod list;
pub mod run;

use anyhow::{Context, Result};
use script_executor::{Execution, Outcome, Reason, ScriptCommand, TerminationKind};
use std::io::Write;
use tracing::debug;

enum Report {
    Outcome(Outcome),
    Finished(Reason),
}

/// Run `command`, print pieces as they arrive and return the process exit code
pub async fn supervise(command: ScriptCommand) -> Result<i32> {
    let execution = Execution::new(command);
    let (tx, rx) = async_channel::unbounded();

    let on_success = tx.clone();
    let on_failure = tx.clone();
    let on_termination = tx;

    execution
        .on_streamed_success(|piece| {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(piece.as_bytes());
            let _ = stdout.flush();
        })
        .on_streamed_failure(|piece| {
            let mut stderr = std::io::stderr().lock();
            let _ = stderr.write_all(piece.as_bytes());
            let _ = stderr.flush();
        })
        .on_success(move |stdout| {
            let _ = on_success.try_send(Report::Outcome(Outcome::Succeeded(stdout.to_string())));
        })
        .on_failure(move |failure| {
            let _ = on_failure.try_send(Report::Outcome(Outcome::Failed(failure.clone())));
        })
        .on_termination(move |reason| {
            let _ = on_termination.try_send(Report::Finished(reason.clone()));
        });

    execution.run().context("Failed to start script")?;
    debug!(pid = ?execution.pid(), "waiting for script");

    let mut outcome = None;
    loop {
        match rx.recv().await.context("Script ended without a result")? {
            Report::Outcome(reported) => outcome = Some(reported),
            Report::Finished(reason) => return Ok(exit_code(outcome.as_ref(), &reason)),
        }
    }
}

fn exit_code(outcome: Option<&Outcome>, reason: &Reason) -> i32 {
    match outcome {
        Some(Outcome::Succeeded(_)) => 0,
        Some(Outcome::Failed(failure)) => {
            eprintln!("script failed: {}", failure);
            failure_code(reason)
        }
        None => {
            eprintln!("script was stopped");
            failure_code(reason)
        }
    }
}

fn failure_code(reason: &Reason) -> i32 {
    match reason.kind {
        TerminationKind::Exit if reason.code > 0 => reason.code,
        _ => 1,
    }
}
