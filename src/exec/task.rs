// src/exec/task.rs

//! Task model: one submitted unit of work plus the result slot it shares with
//! the caller's [`TaskHandle`].
//!
//! The worker is the only writer of the slot. Completion is published through
//! a `watch` channel after the slot is filled, so anyone who observes
//! `completed == true` also observes the outcome.
//!
//! A task that is discarded without running (shutdown drain) simply drops its
//! [`Completion`]. The `watch` sender goes away with it, which is how waiting
//! handles learn that the task was abandoned.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::error;

use super::process::{ProcessKilled, WorkContext};

/// Monotonically increasing identifier assigned at submission.
pub type TaskId = u64;

/// Why a task did not produce a value.
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    /// The work returned an error.
    #[error("work failed: {0:#}")]
    Failed(Arc<anyhow::Error>),

    /// The work panicked. Carries the panic message when it was a string.
    #[error("work panicked: {0}")]
    Panicked(String),

    /// The task's external process was killed by `shutdown`.
    #[error("in-flight process was terminated by shutdown")]
    Cancelled,

    /// The task was discarded from the queue before it ever ran.
    #[error("task was discarded before it ran")]
    Abandoned,
}

impl TaskError {
    fn from_work_error(err: anyhow::Error) -> Self {
        if err.chain().any(|cause| cause.is::<ProcessKilled>()) {
            TaskError::Cancelled
        } else {
            TaskError::Failed(Arc::new(err))
        }
    }

    fn from_join_error(task_id: TaskId, err: JoinError) -> Self {
        match err.try_into_panic() {
            Ok(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                TaskError::Panicked(message)
            }
            Err(err) => {
                // Not a panic: the runtime cancelled the job underneath us.
                error!(task_id, error = %err, "job was cancelled by the runtime");
                TaskError::Failed(Arc::new(anyhow::Error::new(err)))
            }
        }
    }
}

type Slot<T> = Arc<Mutex<Option<Result<T, TaskError>>>>;

/// Caller-side view of a submitted task.
///
/// Cloning a handle is cheap; every clone observes the same slot.
pub struct TaskHandle<T> {
    id: TaskId,
    slot: Slot<T>,
    done: watch::Receiver<bool>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            slot: Arc::clone(&self.slot),
            done: self.done.clone(),
        }
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("completed", &self.is_completed())
            .finish_non_exhaustive()
    }
}

impl<T> TaskHandle<T> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// True once the worker has finished running this task (success or
    /// failure). Stays false forever for tasks discarded by `shutdown`.
    pub fn is_completed(&self) -> bool {
        *self.done.borrow()
    }

    /// The error recorded for this task, if it has completed with one.
    pub fn error(&self) -> Option<TaskError> {
        let guard = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(Err(err)) => Some(err.clone()),
            _ => None,
        }
    }
}

impl<T: Clone> TaskHandle<T> {
    /// The value returned by the work, if it has completed successfully.
    pub fn result(&self) -> Option<T> {
        let guard = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(Ok(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Snapshot of the outcome; `None` while the task is queued or running.
    pub fn outcome(&self) -> Option<Result<T, TaskError>> {
        let guard = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }

    /// Wait for the task to complete and return its outcome.
    ///
    /// Resolves to [`TaskError::Abandoned`] if the task is discarded by
    /// `shutdown` before it runs.
    pub async fn wait(&self) -> Result<T, TaskError> {
        let mut done = self.done.clone();
        if done.wait_for(|completed| *completed).await.is_err() {
            return Err(TaskError::Abandoned);
        }
        self.outcome().unwrap_or(Err(TaskError::Abandoned))
    }
}

/// Worker-side write end of a task's slot. Consumed on completion, so the
/// slot can only ever be written once.
struct Completion<T> {
    slot: Slot<T>,
    done: watch::Sender<bool>,
}

impl<T> Completion<T> {
    fn complete(self, outcome: Result<T, TaskError>) {
        {
            let mut guard = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            debug_assert!(guard.is_none(), "task slot written twice");
            *guard = Some(outcome);
        }
        self.done.send_replace(true);
    }
}

type Job = Box<dyn FnOnce(WorkContext) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// A queued unit of work, type-erased so heterogeneous tasks share a queue.
pub(crate) struct Task {
    id: TaskId,
    job: Job,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Task {
    /// Build a task and its caller handle.
    ///
    /// `spawn` starts the actual work on the runtime (as an async task or on
    /// the blocking pool). Running the work in its own Tokio task means a
    /// panic surfaces as a `JoinError` instead of unwinding through the
    /// worker loop.
    pub(crate) fn new<T, S>(id: TaskId, spawn: S) -> (Task, TaskHandle<T>)
    where
        T: Send + 'static,
        S: FnOnce(WorkContext) -> JoinHandle<anyhow::Result<T>> + Send + 'static,
    {
        let slot: Slot<T> = Arc::new(Mutex::new(None));
        let (done_tx, done_rx) = watch::channel(false);

        let completion = Completion {
            slot: Arc::clone(&slot),
            done: done_tx,
        };

        let job: Job = Box::new(move |ctx: WorkContext| {
            Box::pin(async move {
                let outcome = match spawn(ctx).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(TaskError::from_work_error(err)),
                    Err(join_err) => Err(TaskError::from_join_error(id, join_err)),
                };
                completion.complete(outcome);
            })
        });

        let handle = TaskHandle {
            id,
            slot,
            done: done_rx,
        };

        (Task { id, job }, handle)
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    /// Run the work to completion and record its outcome.
    pub(crate) async fn run(self, ctx: WorkContext) {
        (self.job)(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn killed_process_maps_to_cancelled() {
        let err = anyhow::Error::new(ProcessKilled).context("speaking");
        assert!(matches!(
            TaskError::from_work_error(err),
            TaskError::Cancelled
        ));
    }

    #[test]
    fn plain_error_maps_to_failed() {
        let err = anyhow::anyhow!("boom");
        match TaskError::from_work_error(err) {
            TaskError::Failed(inner) => assert_eq!(inner.to_string(), "boom"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn dropped_task_leaves_handle_incomplete() {
        let (task, handle) = Task::new::<u32, _>(7, |_ctx| tokio::spawn(async { Ok(1) }));
        assert_eq!(task.id(), 7);
        drop(task);

        assert!(!handle.is_completed());
        assert!(handle.outcome().is_none());
        assert!(handle.error().is_none());
    }
}
