// src/exec/mod.rs

//! Serialized task execution.
//!
//! Producers hand work to an [`Executor`]; a single background worker runs it
//! one task at a time, in submission order.
//!
//! - [`task`] holds the task model and the caller-facing [`TaskHandle`].
//! - [`queue`] is the unbounded pending queue plus the outstanding counter
//!   behind `wait_idle`.
//! - [`worker`] owns the worker loop and its stop/drain protocol.
//! - [`in_flight`] is the synchronized slot through which `shutdown` kills a
//!   running external process.
//! - [`process`] runs external processes on behalf of a task.
//! - [`executor`] is the public facade.

pub mod executor;
mod in_flight;
pub mod process;
mod queue;
pub mod task;
mod worker;

pub use executor::{Executor, ExecutorSettings};
pub use process::{ProcessKilled, WorkContext};
pub use task::{TaskError, TaskHandle, TaskId};
