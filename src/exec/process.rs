// src/exec/process.rs

//! External process execution for tasks that drive a subprocess.
//!
//! Work that spawns a process goes through [`WorkContext::run_process`] so the
//! process is registered in the worker's in-flight slot while it runs. That
//! is what lets `shutdown` kill it instead of waiting for it to finish.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use super::in_flight::InFlightSlot;
use super::task::TaskId;

/// Marker error for a process that was killed by executor shutdown.
///
/// Tasks failing with this error (anywhere in their error chain) are recorded
/// as [`TaskError::Cancelled`](super::TaskError::Cancelled).
#[derive(Error, Debug, Clone, Copy)]
#[error("process was killed by executor shutdown")]
pub struct ProcessKilled;

/// Per-task execution context handed to async work.
#[derive(Debug, Clone)]
pub struct WorkContext {
    task_id: TaskId,
    in_flight: Arc<InFlightSlot>,
    kill_timeout: Duration,
}

impl WorkContext {
    pub(crate) fn new(task_id: TaskId, in_flight: Arc<InFlightSlot>, kill_timeout: Duration) -> Self {
        Self {
            task_id,
            in_flight,
            kill_timeout,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Spawn `cmd`, publish it as the in-flight process and wait for it.
    ///
    /// - Waits for any previously published process to exit first.
    /// - stdout/stderr are piped and logged at debug level.
    /// - If shutdown kills the process, fails with [`ProcessKilled`].
    pub async fn run_process(&self, mut cmd: Command) -> Result<ExitStatus> {
        self.in_flight.wait_for_previous().await;

        let program = cmd.as_std().get_program().to_string_lossy().into_owned();

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning '{program}' for task {}", self.task_id))?;
        let pid = child.id();

        info!(task_id = self.task_id, pid, program = %program, "started process");

        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let (exited_tx, exited_rx) = watch::channel(false);

        if !self.in_flight.publish(self.task_id, pid, kill_tx, exited_rx) {
            info!(
                task_id = self.task_id,
                pid,
                "shutdown already in progress; killing freshly spawned process"
            );
            self.kill(&mut child).await;
            exited_tx.send_replace(true);
            return Err(ProcessKilled.into());
        }

        forward_output(self.task_id, "stdout", child.stdout.take());
        forward_output(self.task_id, "stderr", child.stderr.take());

        let outcome = self.supervise(&mut child, &program, kill_rx).await;

        exited_tx.send_replace(true);
        self.in_flight.clear(self.task_id);

        outcome
    }

    /// Either the process exits on its own, or the kill switch fires.
    async fn supervise(
        &self,
        child: &mut Child,
        program: &str,
        mut kill_rx: oneshot::Receiver<()>,
    ) -> Result<ExitStatus> {
        tokio::select! {
            status = child.wait() => {
                let status = status
                    .with_context(|| format!("waiting for '{program}' (task {})", self.task_id))?;
                info!(
                    task_id = self.task_id,
                    exit_code = status.code().unwrap_or(-1),
                    success = status.success(),
                    "process exited"
                );
                Ok(status)
            }

            cancel = &mut kill_rx => {
                match cancel {
                    Ok(()) => {
                        info!(task_id = self.task_id, "shutdown requested; killing in-flight process");
                        self.kill(child).await;
                        Err(ProcessKilled.into())
                    }
                    Err(_) => {
                        // Kill switch dropped without firing; keep waiting normally.
                        debug!(task_id = self.task_id, "kill switch dropped without cancellation");
                        let status = child
                            .wait()
                            .await
                            .with_context(|| format!("waiting for '{program}' (task {})", self.task_id))?;
                        Ok(status)
                    }
                }
            }
        }
    }

    /// Kill and reap, bounded by the configured timeout.
    async fn kill(&self, child: &mut Child) {
        match tokio::time::timeout(self.kill_timeout, child.kill()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(
                task_id = self.task_id,
                error = %e,
                "failed to kill child process"
            ),
            Err(_) => warn!(
                task_id = self.task_id,
                timeout_ms = self.kill_timeout.as_millis() as u64,
                "timed out waiting for killed process to exit"
            ),
        }
    }
}

/// Consume a child's output stream so pipe buffers never fill up.
fn forward_output<R>(task_id: TaskId, stream: &'static str, reader: Option<R>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let Some(reader) = reader else {
        return;
    };

    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(task_id, stream, "{}", line);
        }
    });
}
