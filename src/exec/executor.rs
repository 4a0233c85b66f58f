// src/exec/executor.rs

//! The executor facade: `submit`, `wait_idle` and `shutdown`.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::errors::Result;

use super::process::WorkContext;
use super::queue::Outstanding;
use super::task::{Task, TaskHandle, TaskId};
use super::worker::{spawn_worker, WorkerHandle};

/// Tunables for an [`Executor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Upper bound on waiting for a killed process to be reaped.
    pub kill_timeout: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            kill_timeout: Duration::from_millis(2000),
        }
    }
}

/// Serialized task executor.
///
/// Tasks run one at a time, in submission order, on a single background
/// worker. The worker is started lazily by the first `submit`, stopped by
/// `shutdown`, and started again by the next `submit`.
///
/// `Executor` is cheap to clone; clones share the same queue and worker.
#[derive(Debug, Clone)]
pub struct Executor {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    runtime: Handle,
    settings: ExecutorSettings,
    next_task_id: AtomicU64,
    next_generation: AtomicU64,
    outstanding: Outstanding,
    run_lock: Arc<AsyncMutex<()>>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl Executor {
    /// Create an executor bound to the current Tokio runtime.
    pub fn new(settings: ExecutorSettings) -> Result<Self> {
        let runtime = Handle::try_current().map_err(anyhow::Error::from)?;
        Ok(Self::with_handle(runtime, settings))
    }

    /// Create an executor whose worker runs on `runtime`.
    ///
    /// `submit` may then be called from any thread, inside or outside the
    /// runtime.
    pub fn with_handle(runtime: Handle, settings: ExecutorSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                runtime,
                settings,
                next_task_id: AtomicU64::new(0),
                next_generation: AtomicU64::new(0),
                outstanding: Outstanding::new(),
                run_lock: Arc::new(AsyncMutex::new(())),
                worker: Mutex::new(None),
            }),
        }
    }

    pub fn settings(&self) -> ExecutorSettings {
        self.inner.settings
    }

    /// Queue async work. Never blocks and never fails; errors and panics
    /// inside `work` are recorded on the returned handle.
    pub fn submit<T, F, Fut>(&self, work: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(WorkContext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        // Call `work` inside the spawned task so a panic while building the
        // future is caught like any other panic in the work.
        self.enqueue(move |ctx| tokio::spawn(async move { work(ctx).await }))
    }

    /// Queue synchronous work. It runs on the blocking pool but still
    /// occupies the worker, so ordering is the same as for `submit`.
    pub fn submit_blocking<T, F>(&self, work: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        self.enqueue(move |_ctx| tokio::task::spawn_blocking(work))
    }

    fn enqueue<T, S>(&self, spawn: S) -> TaskHandle<T>
    where
        T: Send + 'static,
        S: FnOnce(WorkContext) -> tokio::task::JoinHandle<anyhow::Result<T>> + Send + 'static,
    {
        let mut worker = self.lock_worker();

        // Ids are assigned under the lock so they follow queue order.
        let id: TaskId = self.inner.next_task_id.fetch_add(1, Ordering::Relaxed);
        let (mut task, handle) = Task::new(id, spawn);

        loop {
            if worker.as_ref().is_some_and(|w| !w.is_alive()) {
                warn!("worker is no longer running; starting a new one");
                *worker = None;
            }

            let current = worker.get_or_insert_with(|| self.inner.start_worker());
            match current.push(task) {
                Ok(()) => break,
                Err(returned) => {
                    // The worker dropped its queue; replace it and retry.
                    *worker = None;
                    task = returned;
                }
            }
        }

        debug!(task_id = id, "task submitted");
        handle
    }

    /// Wait until every task submitted so far has been processed.
    pub async fn wait_idle(&self) {
        self.inner.outstanding.wait_idle().await
    }

    /// Like [`wait_idle`](Self::wait_idle), giving up after `timeout`.
    ///
    /// Returns `true` if the executor became idle in time.
    pub async fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_idle()).await.is_ok()
    }

    /// Number of tasks queued or executing.
    pub fn pending(&self) -> usize {
        self.inner.outstanding.get()
    }

    /// Whether a worker is currently alive.
    pub fn is_running(&self) -> bool {
        self.lock_worker().as_ref().is_some_and(WorkerHandle::is_alive)
    }

    /// Pid of the external process the worker is currently waiting on.
    pub fn in_flight_pid(&self) -> Option<u32> {
        self.lock_worker()
            .as_ref()
            .and_then(WorkerHandle::in_flight_pid)
    }

    /// Stop the worker and discard queued tasks.
    ///
    /// - queued tasks are dropped unexecuted (`completed` stays false);
    /// - an in-flight external process is killed;
    /// - in-memory work already running is allowed to finish.
    ///
    /// Returns once the worker has stopped. Calling it with no worker running
    /// is a no-op; a later `submit` starts a fresh worker.
    pub async fn shutdown(&self) {
        let worker = self.lock_worker().take();

        let Some(worker) = worker else {
            debug!("shutdown requested but no worker is running");
            return;
        };

        info!("shutting down executor");
        worker.stop().await;
        info!("executor shut down");
    }

    fn lock_worker(&self) -> std::sync::MutexGuard<'_, Option<WorkerHandle>> {
        self.inner
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Inner {
    fn start_worker(&self) -> WorkerHandle {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        debug!(generation, "starting worker");
        spawn_worker(
            &self.runtime,
            generation,
            self.outstanding.clone(),
            Arc::clone(&self.run_lock),
            self.settings.kill_timeout,
        )
    }
}
