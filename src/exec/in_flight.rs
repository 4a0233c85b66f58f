// src/exec/in_flight.rs

//! Synchronized "current process" slot shared by the worker and `shutdown`.
//!
//! Ordering contract, all under the slot's mutex:
//! - the worker publishes a process (pid + kill switch) *before* it starts
//!   waiting on it, and clears it after the process has been reaped;
//! - `shutdown` reads and fires the kill switch, then leaves the slot in the
//!   `Stopping` state;
//! - a worker that tries to publish into a `Stopping` slot is refused and
//!   must kill its own freshly spawned process.
//!
//! This rules out the two races a bare `Option<Child>` would allow: killing
//! a stale handle, and missing a process that was spawned just after the
//! shutdown read the slot.

use std::sync::{Mutex, PoisonError};

use tokio::sync::{oneshot, watch};
use tracing::debug;

use super::task::TaskId;

#[derive(Debug)]
enum SlotState {
    Idle {
        /// Exit signal of the most recently finished process.
        last_exit: Option<watch::Receiver<bool>>,
    },
    Running {
        task_id: TaskId,
        pid: Option<u32>,
        kill: oneshot::Sender<()>,
        exited: watch::Receiver<bool>,
    },
    Stopping,
}

/// What `shutdown` found in the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Terminated {
    /// Nothing was running.
    Nothing,
    /// A kill request was sent to this process.
    Process { task_id: TaskId, pid: Option<u32> },
}

#[derive(Debug)]
pub(crate) struct InFlightSlot {
    state: Mutex<SlotState>,
}

impl InFlightSlot {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Idle { last_exit: None }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until the previously published process (if any) has fully exited.
    ///
    /// The single worker already serializes tasks, so this normally returns
    /// at once. It matters when a previous process was cleared from the slot
    /// while its reaping was still in progress.
    pub(crate) async fn wait_for_previous(&self) {
        let previous = {
            let state = self.lock();
            match &*state {
                SlotState::Idle { last_exit } => last_exit.clone(),
                SlotState::Running { exited, .. } => Some(exited.clone()),
                SlotState::Stopping => None,
            }
        };

        if let Some(mut exited) = previous {
            let already_exited = *exited.borrow();
            if !already_exited {
                debug!("waiting for previous process to exit before spawning");
            }
            // A closed channel means the runner is gone, which is as good as exited.
            let _ = exited.wait_for(|done| *done).await;
        }
    }

    /// Publish a freshly spawned process.
    ///
    /// Returns `false` if shutdown already claimed the slot; the caller then
    /// owns killing the process.
    pub(crate) fn publish(
        &self,
        task_id: TaskId,
        pid: Option<u32>,
        kill: oneshot::Sender<()>,
        exited: watch::Receiver<bool>,
    ) -> bool {
        let mut state = self.lock();
        if matches!(*state, SlotState::Stopping) {
            return false;
        }
        *state = SlotState::Running {
            task_id,
            pid,
            kill,
            exited,
        };
        true
    }

    /// Clear the slot after the process for `task_id` has been reaped.
    pub(crate) fn clear(&self, task_id: TaskId) {
        let mut state = self.lock();
        let owned_by_task = matches!(
            &*state,
            SlotState::Running { task_id: current, .. } if *current == task_id
        );
        if !owned_by_task {
            return;
        }
        if let SlotState::Running { exited, .. } =
            std::mem::replace(&mut *state, SlotState::Idle { last_exit: None })
        {
            *state = SlotState::Idle {
                last_exit: Some(exited),
            };
        }
    }

    /// Pid of the process currently published, if any.
    pub(crate) fn current_pid(&self) -> Option<u32> {
        match &*self.lock() {
            SlotState::Running { pid, .. } => *pid,
            _ => None,
        }
    }

    /// Claim the slot for shutdown, killing whatever is running.
    pub(crate) fn terminate(&self) -> Terminated {
        let previous = std::mem::replace(&mut *self.lock(), SlotState::Stopping);
        match previous {
            SlotState::Running {
                task_id, pid, kill, ..
            } => {
                // The runner may have just exited on its own; that is fine.
                let _ = kill.send(());
                Terminated::Process { task_id, pid }
            }
            SlotState::Idle { .. } | SlotState::Stopping => Terminated::Nothing,
        }
    }
}
