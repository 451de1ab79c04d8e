//! Tests for supervised script execution against a real shell

use script_executor::{
    Execution, Failure, Outcome, Phase, Piece, ScriptCommand, TerminationKind,
};
use std::sync::Arc;
use std::time::Duration;

mod common;

use common::{Record, collect, record, recv_timeout, run_to_end, wait_until};

#[test]
fn test_echo_succeeds_with_stdout() {
    futures::executor::block_on(async {
        let execution = Execution::new(ScriptCommand::new("echo Hello"));
        let transcript = run_to_end(&execution).await.unwrap();

        assert_eq!(transcript.pieces(), vec![Piece::Succeeded("Hello\n".to_string())]);
        assert_eq!(
            transcript.outcome(),
            Some(Outcome::Succeeded("Hello\n".to_string()))
        );

        let reason = transcript.reason().unwrap();
        assert_eq!(reason.kind, TerminationKind::Exit);
        assert_eq!(reason.code, 0);
        assert!(!execution.is_running());
        assert_eq!(execution.phase(), Phase::Published);
    });
}

#[test]
fn test_streamed_pieces_precede_outcome() {
    futures::executor::block_on(async {
        let execution = Execution::new(ScriptCommand::new("printf 'A\\n~~~\\nB\\n'"));
        let transcript = run_to_end(&execution).await.unwrap();

        assert_eq!(
            transcript.records,
            vec![
                Record::Piece(Piece::Succeeded("A\n".to_string())),
                Record::Piece(Piece::Succeeded("B\n".to_string())),
                Record::Outcome(Outcome::Succeeded("A\nB\n".to_string())),
                Record::Finished(transcript.reason().unwrap().clone()),
            ]
        );
        assert!(execution.is_stdout_streaming());
        assert!(!execution.is_stderr_streaming());
    });
}

#[test]
fn test_exit_2_is_syntax_error() {
    futures::executor::block_on(async {
        let execution = Execution::new(ScriptCommand::new("exit 2"));
        let transcript = run_to_end(&execution).await.unwrap();

        assert_eq!(
            transcript.outcome(),
            Some(Outcome::Failed(Failure::SyntaxError {
                stderr: None,
                code: 2
            }))
        );
    });
}

#[test]
fn test_non_executable_file() {
    futures::executor::block_on(async {
        let script = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(script.path(), "#!/bin/bash\necho never\n").unwrap();

        let command = ScriptCommand::new(script.path().display().to_string());
        let execution = Execution::new(command);
        let transcript = run_to_end(&execution).await.unwrap();

        match transcript.outcome() {
            Some(Outcome::Failed(Failure::NotExecutable { stderr, code })) => {
                assert_eq!(code, 126);
                assert!(stderr.unwrap().contains("Permission denied"));
            }
            other => panic!("expected NotExecutable, got {other:?}"),
        }
    });
}

#[test]
fn test_missing_path() {
    futures::executor::block_on(async {
        let execution = Execution::new(ScriptCommand::new("/nonexistent/script.sh"));
        let transcript = run_to_end(&execution).await.unwrap();

        assert!(matches!(
            transcript.outcome(),
            Some(Outcome::Failed(Failure::PathNotFound { code: 127, stderr: Some(_) }))
        ));
        // Stderr was streamed before the outcome
        assert!(matches!(transcript.records.first(), Some(Record::Piece(Piece::Failed(_)))));
    });
}

#[test]
fn test_zero_exit_with_only_stderr_fails() {
    futures::executor::block_on(async {
        let execution = Execution::new(ScriptCommand::new("echo warn >&2"));
        let transcript = run_to_end(&execution).await.unwrap();

        assert_eq!(transcript.pieces(), vec![Piece::Failed("warn\n".to_string())]);
        assert_eq!(
            transcript.outcome(),
            Some(Outcome::Failed(Failure::ZeroExitCodeWithStderr {
                stderr: "warn\n".to_string()
            }))
        );
    });
}

#[test]
fn test_mixed_output_with_exit_code() {
    futures::executor::block_on(async {
        let execution = Execution::new(ScriptCommand::new("echo out; echo err >&2; exit 3"));
        let transcript = run_to_end(&execution).await.unwrap();

        assert_eq!(
            transcript.outcome(),
            Some(Outcome::Failed(Failure::MixedOutput {
                stdout: "out\n".to_string(),
                stderr: "err\n".to_string(),
                code: 3,
            }))
        );
    });
}

#[test]
fn test_external_sigterm_counts_as_stop() {
    futures::executor::block_on(async {
        let execution = Execution::new(ScriptCommand::new("kill -TERM $$"));
        let transcript = run_to_end(&execution).await.unwrap();

        assert_eq!(transcript.outcome(), None);

        let reason = transcript.reason().unwrap();
        assert_eq!(reason.kind, TerminationKind::Signal);
        assert_eq!(reason.code, 15);
        assert!(execution.is_manually_terminated());
        wait_until(|| execution.phase() == Phase::Stopped).await.unwrap();
    });
}

#[test]
fn test_sigkill_is_uncaught_signal() {
    futures::executor::block_on(async {
        let execution = Execution::new(ScriptCommand::new("kill -KILL $$"));
        let transcript = run_to_end(&execution).await.unwrap();

        assert_eq!(
            transcript.outcome(),
            Some(Outcome::Failed(Failure::UncaughtSignal {
                stderr: None,
                signal: 9
            }))
        );
        assert!(!execution.is_manually_terminated());
    });
}

#[smol_potat::test]
async fn test_arguments_are_positional() {
    let command = ScriptCommand::builder("printf '%s|'")
        .args(["A", "B C"])
        .build();
    let execution = Execution::new(command);
    let transcript = run_to_end(&execution).await.unwrap();

    assert_eq!(
        transcript.outcome(),
        Some(Outcome::Succeeded("A|B C|".to_string()))
    );
}

#[smol_potat::test]
async fn test_environment_overrides_win() {
    let command = ScriptCommand::builder("echo \"$GREETING:$HOME\"")
        .env("GREETING", "hi")
        .env("HOME", "/custom/home")
        .build();
    let execution = Execution::new(command);
    let transcript = run_to_end(&execution).await.unwrap();

    assert_eq!(
        transcript.outcome(),
        Some(Outcome::Succeeded("hi:/custom/home\n".to_string()))
    );
}

#[smol_potat::test]
async fn test_host_environment_is_inherited() {
    let path = std::env::var("PATH").unwrap();
    let execution = Execution::new(ScriptCommand::new("echo \"$PATH\""));
    let transcript = run_to_end(&execution).await.unwrap();

    assert_eq!(transcript.outcome(), Some(Outcome::Succeeded(format!("{path}\n"))));
}

#[smol_potat::test]
async fn test_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    let command = ScriptCommand::builder("pwd -P")
        .current_dir(dir.path())
        .build();
    let execution = Execution::new(command);
    let transcript = run_to_end(&execution).await.unwrap();

    let expected = format!("{}\n", dir.path().canonicalize().unwrap().display());
    assert_eq!(transcript.outcome(), Some(Outcome::Succeeded(expected)));
}

#[smol_potat::test]
async fn test_custom_delimiter() {
    let command = ScriptCommand::builder("printf 'one\\ntwo\\nthree'")
        .delimiter("\n")
        .build();
    let execution = Execution::new(command);
    let transcript = run_to_end(&execution).await.unwrap();

    assert_eq!(
        transcript.pieces(),
        vec![
            Piece::Succeeded("one".to_string()),
            Piece::Succeeded("two".to_string()),
            Piece::Succeeded("three".to_string()),
        ]
    );
    assert_eq!(
        transcript.outcome(),
        Some(Outcome::Succeeded("onetwothree".to_string()))
    );
}

#[smol_potat::test]
async fn test_terminate_suppresses_outcome() {
    let execution = Execution::new(ScriptCommand::new("sleep 5"));
    let rx = record(&execution);

    execution.run().unwrap();
    assert!(execution.is_running());
    assert!(execution.pid().is_some());

    assert!(execution.terminate());
    assert!(execution.is_manually_terminated());
    // A second request is refused
    assert!(!execution.terminate());

    let transcript = collect(&rx).await.unwrap();

    assert_eq!(transcript.outcome(), None);
    assert!(transcript.reason().is_some());
    wait_until(|| !execution.is_running()).await.unwrap();
    assert_eq!(execution.phase(), Phase::Stopped);
}

#[smol_potat::test]
async fn test_terminate_streams_pending_tail() {
    let execution = Execution::new(ScriptCommand::new("printf 'partial'; sleep 5"));
    let rx = record(&execution);
    execution.run().unwrap();

    // Let the unframed output reach the reader
    smol::Timer::after(Duration::from_millis(300)).await;
    assert!(rx.is_empty());

    assert!(execution.terminate());
    let transcript = collect(&rx).await.unwrap();

    assert_eq!(transcript.pieces(), vec![Piece::Succeeded("partial".to_string())]);
    assert_eq!(transcript.outcome(), None);
    assert_eq!(
        transcript.reason().and_then(|reason| reason.stdout.clone()),
        Some("partial".to_string())
    );
}

#[smol_potat::test]
async fn test_run_twice_is_noop() {
    let execution = Execution::new(ScriptCommand::new("echo once"));
    let rx = record(&execution);

    execution.run().unwrap();
    let pid = execution.pid();
    execution.run().unwrap();
    assert_eq!(execution.pid(), pid);

    let transcript = collect(&rx).await.unwrap();
    assert_eq!(transcript.outcomes().len(), 1);

    smol::Timer::after(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err());
}

#[smol_potat::test]
async fn test_callbacks_may_call_back_into_execution() {
    let execution = Arc::new(Execution::new(ScriptCommand::new("printf 'A~~~\\n'")));
    let (tx, rx) = async_channel::unbounded();

    let weak = Arc::downgrade(&execution);
    execution.on_success(move |_| {
        if let Some(execution) = weak.upgrade() {
            let _ = tx.try_send((execution.is_stdout_streaming(), execution.is_running()));
        }
    });

    execution.run().unwrap();
    let (streaming, running) = recv_timeout(&rx).await.unwrap();
    assert!(streaming);
    assert!(!running);
}

#[smol_potat::test]
async fn test_clear_drops_history_before_aggregate() {
    let execution = Arc::new(Execution::new(ScriptCommand::new(
        "printf 'A~~~\\n'; sleep 0.3; printf 'B'",
    )));

    let weak = Arc::downgrade(&execution);
    execution.on_streamed_success(move |piece| {
        if piece == "A" {
            if let Some(execution) = weak.upgrade() {
                execution.clear();
            }
        }
    });

    let transcript = run_to_end(&execution).await.unwrap();
    assert_eq!(transcript.outcome(), Some(Outcome::Succeeded("B".to_string())));
}
