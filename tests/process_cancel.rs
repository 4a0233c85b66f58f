#![cfg(unix)]

use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::process::Command;

use speakq::exec::{Executor, ExecutorSettings, TaskError};
use speakq_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn process_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

async fn wait_for_in_flight(executor: &Executor) -> u32 {
    for _ in 0..200 {
        if let Some(pid) = executor.in_flight_pid() {
            return pid;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no process became in-flight");
}

#[tokio::test]
async fn shutdown_kills_the_in_flight_process() -> TestResult {
    init_tracing();

    let executor = Executor::new(ExecutorSettings::default())?;

    let speaking = executor.submit(|ctx| async move {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        ctx.run_process(cmd).await
    });
    let queued = executor.submit(|_ctx| async { Ok(()) });

    let pid = wait_for_in_flight(&executor).await;
    assert!(process_alive(pid));

    let started = Instant::now();
    with_timeout(executor.shutdown()).await;
    assert!(
        started.elapsed() < Duration::from_secs(3),
        "shutdown waited for the process instead of killing it"
    );

    assert!(speaking.is_completed());
    assert!(matches!(speaking.error(), Some(TaskError::Cancelled)));
    assert!(!queued.is_completed());
    assert!(!process_alive(pid), "process {pid} still running after shutdown");
    assert_eq!(executor.in_flight_pid(), None);
    Ok(())
}

#[tokio::test]
async fn process_started_after_shutdown_began_is_killed() -> TestResult {
    init_tracing();

    let executor = Executor::new(ExecutorSettings::default())?;
    let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();

    // The work is still in memory when shutdown runs, and only spawns its
    // process afterwards.
    let late = executor.submit(|ctx| async move {
        let _ = started_tx.send(());
        tokio::time::sleep(Duration::from_millis(150)).await;
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        ctx.run_process(cmd).await
    });

    with_timeout(started_rx).await?;
    assert_eq!(executor.in_flight_pid(), None);

    let started = Instant::now();
    with_timeout(executor.shutdown()).await;
    assert!(
        started.elapsed() < Duration::from_secs(3),
        "shutdown waited for a process spawned after it began"
    );

    assert!(matches!(late.error(), Some(TaskError::Cancelled)));
    assert_eq!(executor.in_flight_pid(), None);
    Ok(())
}

#[tokio::test]
async fn process_exit_status_is_reported() -> TestResult {
    init_tracing();

    let executor = Executor::new(ExecutorSettings::default())?;

    let ok = executor.submit(|ctx| async move { ctx.run_process(Command::new("true")).await });
    let failing = executor.submit(|ctx| async move {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo oops >&2; exit 3");
        let status = ctx.run_process(cmd).await?;
        Ok(status.code())
    });

    assert!(with_timeout(ok.wait()).await?.success());
    assert_eq!(with_timeout(failing.wait()).await?, Some(3));

    executor.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn missing_program_fails_the_task_only() -> TestResult {
    init_tracing();

    let executor = Executor::new(ExecutorSettings::default())?;

    let missing = executor.submit(|ctx| async move {
        ctx.run_process(Command::new("speakq-definitely-not-a-program")).await
    });
    let next = executor.submit(|_ctx| async { Ok("next") });

    assert_eq!(with_timeout(next.wait()).await?, "next");
    match missing.error() {
        Some(TaskError::Failed(err)) => assert!(format!("{err:#}").contains("spawning")),
        other => panic!("expected Failed, got {other:?}"),
    }

    executor.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn processes_never_overlap() -> TestResult {
    init_tracing();

    let executor = Executor::new(ExecutorSettings::default())?;
    let spans = Arc::new(Mutex::new(Vec::<(Instant, Instant)>::new()));

    for _ in 0..3 {
        let spans = Arc::clone(&spans);
        executor.submit(move |ctx| async move {
            let start = Instant::now();
            let mut cmd = Command::new("sleep");
            cmd.arg("0.1");
            ctx.run_process(cmd).await?;
            spans.lock().unwrap().push((start, Instant::now()));
            Ok(())
        });
    }

    with_timeout(executor.wait_idle()).await;

    let spans = spans.lock().unwrap().clone();
    assert_eq!(spans.len(), 3);
    for pair in spans.windows(2) {
        assert!(pair[1].0 >= pair[0].1, "process started before previous exited");
    }

    executor.shutdown().await;
    Ok(())
}
