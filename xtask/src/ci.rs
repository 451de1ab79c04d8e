use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use script_executor::{Execution, Reason, ScriptCommand, TerminationKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Args)]
pub struct CiArgs {
    #[command(subcommand)]
    cmd: CiCommand,
}

#[derive(Subcommand)]
pub enum CiCommand {
    /// Run all CI checks
    All,
    /// Format check (read-only)
    #[command(name = "fmt-check")]
    FmtCheck,
    /// Clippy lints
    Clippy,
    /// Run the workspace tests
    Tests,
}

pub async fn run(args: CiArgs) -> Result<()> {
    match args.cmd {
        CiCommand::All => run_all().await,
        CiCommand::FmtCheck => run_fmt().await,
        CiCommand::Clippy => run_clippy().await,
        CiCommand::Tests => run_tests().await,
    }
}

async fn run_all() -> Result<()> {
    println!("Running all CI checks\n");

    println!("Checking code formatting...");
    run_fmt().await?;
    println!("Format check passed\n");

    println!("Running clippy lints...");
    run_clippy().await?;
    println!("Clippy check passed\n");

    println!("Running tests...");
    run_tests().await?;
    println!("Tests passed\n");

    println!("All CI checks passed!");
    Ok(())
}

async fn run_fmt() -> Result<()> {
    let reason = run_cargo_command(&["fmt", "--all", "--", "--check"], |_| {}).await?;
    if !succeeded(&reason) {
        bail!("Format check failed. Run 'cargo fmt --all' to fix.");
    }
    Ok(())
}

async fn run_clippy() -> Result<()> {
    let reason = run_cargo_command(
        &[
            "clippy",
            "--workspace",
            "--all-targets",
            "--",
            "-D",
            "warnings",
        ],
        |_| {},
    )
    .await?;
    if !succeeded(&reason) {
        bail!("Clippy check failed");
    }
    Ok(())
}

async fn run_tests() -> Result<()> {
    let failures = Arc::new(AtomicUsize::new(0));
    let counter = failures.clone();

    let reason = run_cargo_command(&["test", "--workspace"], move |line| {
        if line.contains("FAILED") {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    })
    .await?;

    let failure_count = failures.load(Ordering::Relaxed);
    match (reason.kind, reason.code) {
        (TerminationKind::Exit, 0) if failure_count == 0 => println!("\nAll tests passed"),
        (TerminationKind::Exit, code) => eprintln!("\nTests exited with code: {}", code),
        (TerminationKind::Signal, sig) => eprintln!("\nTests terminated by signal: {}", sig),
    }

    if !succeeded(&reason) || failure_count > 0 {
        bail!("Tests failed ({} failures)", failure_count);
    }

    Ok(())
}

fn succeeded(reason: &Reason) -> bool {
    reason.kind == TerminationKind::Exit && reason.code == 0
}

/// Run cargo under supervision, echoing its output line by line.
///
/// `inspect` sees every line of both streams.
async fn run_cargo_command<F>(args: &[&str], inspect: F) -> Result<Reason>
where
    F: Fn(&str) + Send + Sync + 'static,
{
    let command = ScriptCommand::builder("cargo")
        .args(args.iter().copied())
        .delimiter("\n")
        .build();

    let execution = Execution::new(command);
    let inspect = Arc::new(inspect);
    let (tx, rx) = async_channel::bounded(1);

    let on_stdout = inspect.clone();
    let on_stderr = inspect;
    execution
        .on_streamed_success(move |line| {
            println!("{}", line);
            on_stdout(line);
        })
        .on_streamed_failure(move |line| {
            eprintln!("{}", line);
            on_stderr(line);
        })
        .on_termination(move |reason| {
            let _ = tx.try_send(reason.clone());
        });

    execution.run().context("Failed to launch cargo")?;

    rx.recv()
        .await
        .context("cargo finished without reporting a result")
}
