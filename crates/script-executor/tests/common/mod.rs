//! Common test utilities

#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_channel::Receiver;
use script_executor::{Execution, Outcome, Piece, Reason};
use std::time::Duration;

/// Upper bound for anything a test waits on
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Everything an execution reported, in delivery order
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Piece(Piece),
    Outcome(Outcome),
    Finished(Reason),
}

/// What one run reported until it finished
#[derive(Debug, Default)]
pub struct Transcript {
    pub records: Vec<Record>,
}

impl Transcript {
    pub fn pieces(&self) -> Vec<Piece> {
        self.records
            .iter()
            .filter_map(|record| match record {
                Record::Piece(piece) => Some(piece.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        self.records
            .iter()
            .filter_map(|record| match record {
                Record::Outcome(outcome) => Some(outcome.clone()),
                _ => None,
            })
            .collect()
    }

    /// The single published outcome, if any
    pub fn outcome(&self) -> Option<Outcome> {
        let outcomes = self.outcomes();
        assert!(outcomes.len() <= 1, "more than one outcome: {outcomes:?}");
        outcomes.into_iter().next()
    }

    pub fn reason(&self) -> Option<&Reason> {
        self.records.iter().find_map(|record| match record {
            Record::Finished(reason) => Some(reason),
            _ => None,
        })
    }
}

/// Subscribe to every callback of `execution`
pub fn record(execution: &Execution) -> Receiver<Record> {
    let (tx, rx) = async_channel::unbounded();

    let sender = tx.clone();
    execution.on_streamed_success(move |text| {
        let _ = sender.try_send(Record::Piece(Piece::Succeeded(text.to_string())));
    });
    let sender = tx.clone();
    execution.on_streamed_failure(move |text| {
        let _ = sender.try_send(Record::Piece(Piece::Failed(text.to_string())));
    });
    let sender = tx.clone();
    execution.on_success(move |stdout| {
        let _ = sender.try_send(Record::Outcome(Outcome::Succeeded(stdout.to_string())));
    });
    let sender = tx.clone();
    execution.on_failure(move |failure| {
        let _ = sender.try_send(Record::Outcome(Outcome::Failed(failure.clone())));
    });
    execution.on_termination(move |reason| {
        let _ = tx.try_send(Record::Finished(reason.clone()));
    });

    rx
}

/// Receive one value or fail after [`TIMEOUT`]
pub async fn recv_timeout<T>(rx: &Receiver<T>) -> Result<T> {
    smol::future::or(async { rx.recv().await.map_err(anyhow::Error::from) }, async {
        smol::Timer::after(TIMEOUT).await;
        Err(anyhow!("timed out after {:?}", TIMEOUT))
    })
    .await
}

/// Collect records until the run finished
pub async fn collect(rx: &Receiver<Record>) -> Result<Transcript> {
    let mut transcript = Transcript::default();

    loop {
        let record = recv_timeout(rx).await?;
        let finished = matches!(record, Record::Finished(_));
        transcript.records.push(record);
        if finished {
            return Ok(transcript);
        }
    }
}

/// Run `execution` to the end and return what it reported
pub async fn run_to_end(execution: &Execution) -> Result<Transcript> {
    let rx = record(execution);
    execution.run()?;
    collect(&rx).await
}

/// Poll `condition` until it holds or [`TIMEOUT`] expires
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> Result<()> {
    let deadline = std::time::Instant::now() + TIMEOUT;
    while !condition() {
        if std::time::Instant::now() > deadline {
            return Err(anyhow!("condition not met after {:?}", TIMEOUT));
        }
        smol::Timer::after(Duration::from_millis(20)).await;
    }
    Ok(())
}
