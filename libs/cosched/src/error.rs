// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::task::{Id, State, Suspend};
use core::fmt;

/// The [`Queue`][crate::Queue] was closed and no further items will ever arrive.
///
/// Returned by [`Queue::put`][crate::Queue::put] once the queue has been closed, and by
/// [`Queue::get`][crate::Queue::get] once it has been closed *and* drained.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct QueueClosed(pub(crate) ());

impl fmt::Display for QueueClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("queue closed")
    }
}

impl core::error::Error for QueueClosed {}

/// Reasons why [`Scheduler::run`][crate::Scheduler::run] stopped early.
#[derive(Debug)]
pub enum RunError {
    /// A task failed. Its error is carried as-is, the scheduler never interprets task errors.
    TaskFailed {
        task: Id,
        name: Option<String>,
        source: anyhow::Error,
    },
    /// The scheduler detected that its own bookkeeping went wrong.
    Invariant(InvariantViolation),
    /// There was nothing left to run, yet some tasks are still blocked on a queue that nobody
    /// will ever serve.
    Stalled { blocked: usize },
}

impl From<InvariantViolation> for RunError {
    fn from(violation: InvariantViolation) -> Self {
        Self::Invariant(violation)
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::TaskFailed {
                task,
                name: Some(name),
                ..
            } => write!(f, "task {task} ({name}) failed"),
            RunError::TaskFailed { task, name: None, .. } => write!(f, "task {task} failed"),
            RunError::Invariant(violation) => {
                write!(f, "scheduling invariant violated: {violation}")
            }
            RunError::Stalled { blocked } => write!(
                f,
                "no runnable or sleeping tasks left, but {blocked} task(s) are still blocked"
            ),
        }
    }
}

impl core::error::Error for RunError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            RunError::TaskFailed { source, .. } => Some(&**source),
            RunError::Invariant(violation) => Some(violation),
            RunError::Stalled { .. } => None,
        }
    }
}

/// An implementation bug: a task handle ended up somewhere it must never be.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum InvariantViolation {
    /// A handle was scheduled, but the scheduler doesn't own that task (anymore).
    MissingTask { task: Id },
    /// A handle was pulled from the ready queue, but the task isn't runnable.
    NotRunnable { task: Id, state: State },
    /// A waiting list tried to re-admit a task that wasn't blocked.
    NotBlocked { task: Id, state: State },
    /// A task reported [`Suspend::Blocked`] without registering with any waiting list.
    BlockedWithoutWaiter { task: Id },
    /// A task registered with a waiting list but reported a different suspension kind, which
    /// would put its handle in two containers.
    SuspendedWhileBlocked { task: Id, kind: Suspend },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::MissingTask { task } => {
                write!(f, "task {task} is not owned by this scheduler")
            }
            InvariantViolation::NotRunnable { task, state } => {
                write!(f, "task {task} was scheduled while {state:?}")
            }
            InvariantViolation::NotBlocked { task, state } => {
                write!(f, "task {task} was re-admitted while {state:?}")
            }
            InvariantViolation::BlockedWithoutWaiter { task } => {
                write!(f, "task {task} reported blocked but no queue is holding it")
            }
            InvariantViolation::SuspendedWhileBlocked { task, kind } => {
                write!(f, "task {task} is waiting on a queue but suspended with {kind:?}")
            }
        }
    }
}

impl core::error::Error for InvariantViolation {}

/// A future-based task suspended in a way the scheduler can't act on.
///
/// This is reported as the *task's* failure, since it is caused by the task's own logic (for
/// example awaiting a foreign future that relies on wakers).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SuspendError {
    /// The future returned `Pending` without announcing a suspension kind.
    Unannounced { task: Id },
    /// The task started waiting on more than one queue during a single resumption.
    BlockedTwice { task: Id },
    /// Different suspension kinds were announced during a single resumption.
    Conflicting {
        task: Id,
        first: Suspend,
        second: Suspend,
    },
}

impl fmt::Display for SuspendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuspendError::Unannounced { task } => write!(
                f,
                "task {task} returned Pending without yielding, sleeping or blocking on a queue"
            ),
            SuspendError::BlockedTwice { task } => write!(
                f,
                "task {task} started waiting on more than one queue in a single resumption"
            ),
            SuspendError::Conflicting {
                task,
                first,
                second,
            } => write!(
                f,
                "task {task} announced both {first:?} and {second:?} in a single resumption"
            ),
        }
    }
}

impl core::error::Error for SuspendError {}
