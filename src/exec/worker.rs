// src/exec/worker.rs

//! The single background worker that drains the pending queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::in_flight::{InFlightSlot, Terminated};
use super::process::WorkContext;
use super::queue::{pending_queue, Outstanding, QueueReceiver, QueueSender};
use super::task::Task;

/// Executor-side handle to one worker generation.
///
/// - `queue` is the producer end of this generation's pending queue.
/// - `stop` asks the loop to exit after the current task.
/// - `in_flight` is the process slot that `stop` terminates.
/// - `join` is the Tokio task running the loop.
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    generation: u64,
    queue: QueueSender,
    stop: oneshot::Sender<()>,
    in_flight: Arc<InFlightSlot>,
    join: JoinHandle<()>,
}

/// Spawn a new worker generation on `runtime`.
///
/// `run_lock` is held by the loop for its whole lifetime, so a worker started
/// while an older one is still winding down waits for it before running
/// anything.
pub(crate) fn spawn_worker(
    runtime: &Handle,
    generation: u64,
    outstanding: Outstanding,
    run_lock: Arc<AsyncMutex<()>>,
    kill_timeout: Duration,
) -> WorkerHandle {
    let (queue, rx) = pending_queue(outstanding);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let in_flight = Arc::new(InFlightSlot::new());

    let join = runtime.spawn(worker_loop(
        generation,
        rx,
        stop_rx,
        Arc::clone(&in_flight),
        run_lock,
        kill_timeout,
    ));

    WorkerHandle {
        generation,
        queue,
        stop: stop_tx,
        in_flight,
        join,
    }
}

impl WorkerHandle {
    pub(crate) fn is_alive(&self) -> bool {
        !self.join.is_finished()
    }

    pub(crate) fn in_flight_pid(&self) -> Option<u32> {
        self.in_flight.current_pid()
    }

    pub(crate) fn push(&self, task: Task) -> Result<(), Task> {
        self.queue.push(task)
    }

    /// Stop the loop, kill the in-flight process and wait for the loop to exit.
    pub(crate) async fn stop(self) {
        let WorkerHandle {
            generation,
            queue,
            stop,
            in_flight,
            join,
        } = self;

        // The loop may already be gone (e.g. runtime shutting down).
        let _ = stop.send(());
        drop(queue);

        match in_flight.terminate() {
            Terminated::Process { task_id, pid } => {
                info!(generation, task_id, pid, "terminating in-flight process");
            }
            Terminated::Nothing => {
                debug!(generation, "no in-flight process to terminate");
            }
        }

        if let Err(err) = join.await {
            error!(generation, error = %err, "worker loop ended abnormally");
        }
    }
}

async fn worker_loop(
    generation: u64,
    mut rx: QueueReceiver,
    mut stop_rx: oneshot::Receiver<()>,
    in_flight: Arc<InFlightSlot>,
    run_lock: Arc<AsyncMutex<()>>,
    kill_timeout: Duration,
) {
    let _running = run_lock.lock_owned().await;
    info!(generation, "worker started");

    loop {
        // Stop wins over queued work so shutdown never starts another task.
        let task = tokio::select! {
            biased;

            _ = &mut stop_rx => {
                debug!(generation, "stop requested");
                break;
            }

            next = rx.recv() => match next {
                Some(task) => task,
                None => {
                    debug!(generation, "pending queue closed");
                    break;
                }
            },
        };

        let task_id = task.id();
        debug!(generation, task_id, "executing task");

        let ctx = WorkContext::new(task_id, Arc::clone(&in_flight), kill_timeout);
        task.run(ctx).await;
        rx.task_done();

        debug!(generation, task_id, "task completed");
    }

    let dropped = rx.drain();
    if dropped > 0 {
        info!(generation, dropped, "discarded pending tasks without running them");
    }

    info!(generation, "worker stopped");
}
