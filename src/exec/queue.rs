// src/exec/queue.rs

//! Pending queue between producers and the worker.
//!
//! The queue itself is an unbounded `mpsc` channel, so `push` never blocks
//! and any number of producers can enqueue concurrently. Alongside it sits an
//! [`Outstanding`] counter (queued + executing) which `wait_idle` observes.
//!
//! The counter is incremented *before* a task is sent and decremented only
//! after the task has completed or been drained, so a waiter can never see
//! zero while a task is still in the pipeline.

use tokio::sync::{mpsc, watch};

use super::task::Task;

/// Count of tasks that were submitted but not yet processed.
///
/// Shared across worker generations so `wait_idle` keeps working when the
/// executor is restarted after a shutdown.
#[derive(Debug, Clone)]
pub(crate) struct Outstanding {
    count: watch::Sender<usize>,
}

impl Outstanding {
    pub(crate) fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self { count }
    }

    pub(crate) fn get(&self) -> usize {
        *self.count.borrow()
    }

    fn increment(&self) {
        self.count.send_modify(|n| *n += 1);
    }

    fn decrement(&self, by: usize) {
        self.count.send_modify(|n| *n = n.saturating_sub(by));
    }

    /// Resolve once the count reaches zero.
    pub(crate) async fn wait_idle(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

/// Create a fresh queue for one worker generation.
pub(crate) fn pending_queue(outstanding: Outstanding) -> (QueueSender, QueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        QueueSender {
            tx,
            outstanding: outstanding.clone(),
        },
        QueueReceiver { rx, outstanding },
    )
}

#[derive(Debug)]
pub(crate) struct QueueSender {
    tx: mpsc::UnboundedSender<Task>,
    outstanding: Outstanding,
}

impl QueueSender {
    /// Append a task. Hands the task back if the worker side has gone away.
    pub(crate) fn push(&self, task: Task) -> Result<(), Task> {
        self.outstanding.increment();
        self.tx.send(task).map_err(|mpsc::error::SendError(task)| {
            self.outstanding.decrement(1);
            task
        })
    }
}

#[derive(Debug)]
pub(crate) struct QueueReceiver {
    rx: mpsc::UnboundedReceiver<Task>,
    outstanding: Outstanding,
}

impl QueueReceiver {
    /// Wait for the next task. `None` once every sender is gone.
    pub(crate) async fn recv(&mut self) -> Option<Task> {
        self.rx.recv().await
    }

    /// Mark one dequeued task as processed.
    pub(crate) fn task_done(&self) {
        self.outstanding.decrement(1);
    }

    /// Close the queue and discard everything still in it without running it.
    ///
    /// Returns how many tasks were dropped.
    pub(crate) fn drain(&mut self) -> usize {
        self.rx.close();

        let mut dropped = 0;
        while let Ok(task) = self.rx.try_recv() {
            drop(task);
            dropped += 1;
        }

        if dropped > 0 {
            self.outstanding.decrement(dropped);
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_task(id: u64) -> Task {
        let (task, _handle) =
            Task::new::<(), _>(id, |_ctx| tokio::spawn(async { Ok(()) }));
        task
    }

    #[tokio::test]
    async fn push_and_drain_track_outstanding() {
        let outstanding = Outstanding::new();
        let (tx, mut rx) = pending_queue(outstanding.clone());

        tx.push(noop_task(0)).unwrap();
        tx.push(noop_task(1)).unwrap();
        tx.push(noop_task(2)).unwrap();
        assert_eq!(outstanding.get(), 3);

        let first = rx.recv().await.expect("queued task");
        assert_eq!(first.id(), 0);
        rx.task_done();
        assert_eq!(outstanding.get(), 2);

        assert_eq!(rx.drain(), 2);
        assert_eq!(outstanding.get(), 0);

        // Closed queue hands the task back and leaves the count untouched.
        let returned = tx.push(noop_task(3)).unwrap_err();
        assert_eq!(returned.id(), 3);
        assert_eq!(outstanding.get(), 0);
    }

    #[tokio::test]
    async fn wait_idle_resolves_immediately_when_empty() {
        let outstanding = Outstanding::new();
        tokio::time::timeout(std::time::Duration::from_secs(1), outstanding.wait_idle())
            .await
            .expect("idle counter should resolve at once");
    }
}
