// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

mod builder;
mod id;
mod yield_now;

use crate::error::SuspendError;
use crate::scheduler::Handle;
use core::fmt;
use core::pin::Pin;
use core::task::{Context, Poll};
use core::time::Duration;

pub use builder::TaskBuilder;
pub use id::Id;
pub use yield_now::YieldNow;

/// Where a task currently is in its lifecycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum State {
    /// In the ready queue, or currently being resumed.
    Runnable,
    /// Waiting in the deadline heap for its wake-up time.
    Sleeping,
    /// Parked in some queue's waiting list.
    Blocked,
    /// Ran to completion.
    Completed,
    /// Returned an error.
    Failed,
}

impl State {
    /// Returns `true` if the task will never run again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Completed | State::Failed)
    }
}

/// Why a task gave control back to the scheduler.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Suspend {
    /// Make me runnable again immediately, after every other ready task had its turn.
    Yield,
    /// Make me runnable again no sooner than this long from now.
    Sleep(Duration),
    /// Some queue holds my handle and will make me runnable again.
    Blocked,
}

/// The outcome of a single [`Resumable::start`] or [`Resumable::resume`] call that didn't fail.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Step {
    Suspended(Suspend),
    Completed,
}

impl Step {
    /// Suspend and become runnable again after every other ready task had its turn.
    pub const fn yield_now() -> Self {
        Self::Suspended(Suspend::Yield)
    }

    /// Suspend for at least `delay`.
    pub const fn sleep(delay: Duration) -> Self {
        Self::Suspended(Suspend::Sleep(delay))
    }

    /// Suspend until the queue the task registered with during this call hands it back.
    ///
    /// See [`Queue::poll_get`][crate::Queue::poll_get].
    pub const fn blocked() -> Self {
        Self::Suspended(Suspend::Blocked)
    }
}

/// A unit of work the [`Scheduler`][crate::Scheduler] drives to completion.
///
/// The scheduler calls [`start`][Resumable::start] exactly once, and [`resume`][Resumable::resume]
/// every time afterward, until the task returns [`Step::Completed`] or an error. Each call must
/// pick up exactly where the previous one left off.
///
/// While a task is being started or resumed, [`Handle::current`] returns its [`Id`].
///
/// Returning [`Step::blocked`] is only valid after a queue registered the task as a waiter during
/// the same call (see [`Queue::poll_get`][crate::Queue::poll_get]). Errors are never interpreted
/// by the scheduler, they end the whole [`run`][crate::Scheduler::run].
pub trait Resumable {
    /// Begin execution from the top of the task's logic.
    ///
    /// # Errors
    ///
    /// Any error returned here is the task's failure.
    fn start(&mut self, handle: &Handle) -> anyhow::Result<Step> {
        self.resume(handle)
    }

    /// Continue from the previous suspension point.
    ///
    /// # Errors
    ///
    /// Any error returned here is the task's failure.
    fn resume(&mut self, handle: &Handle) -> anyhow::Result<Step>;
}

/// Adapts a [`Future`] into a [`Resumable`] task.
///
/// Futures tell the scheduler why they returned `Pending` through the suspension futures
/// ([`Handle::yield_now`], [`Handle::sleep`], [`Handle::sleep_until`] and
/// [`Queue::get`][crate::Queue::get]). Futures are polled with a no-op waker, so foreign futures
/// that rely on being woken fail the task with [`SuspendError::Unannounced`].
pub struct FutureTask<F> {
    future: Pin<Box<F>>,
}

impl<F> FutureTask<F>
where
    F: Future<Output = anyhow::Result<()>>,
{
    pub fn new(future: F) -> Self {
        Self {
            future: Box::pin(future),
        }
    }
}

impl<F> Resumable for FutureTask<F>
where
    F: Future<Output = anyhow::Result<()>>,
{
    fn resume(&mut self, handle: &Handle) -> anyhow::Result<Step> {
        let mut cx = Context::from_waker(futures::task::noop_waker_ref());

        match self.future.as_mut().poll(&mut cx) {
            Poll::Ready(Ok(())) => Ok(Step::Completed),
            Poll::Ready(Err(err)) => Err(err),
            Poll::Pending => match handle.take_announced()? {
                Some(kind) => Ok(Step::Suspended(kind)),
                None => Err(SuspendError::Unannounced {
                    task: handle.current().unwrap_or(Id::stub()),
                }
                .into()),
            },
        }
    }
}

impl<F> fmt::Debug for FutureTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureTask")
            .field("future", &core::any::type_name::<F>())
            .finish_non_exhaustive()
    }
}

/// A one-shot closure, optionally delayed, run as a task.
///
/// Built by [`Handle::call_soon`] and [`Handle::call_later`].
pub struct Callback<F> {
    delay: Option<Duration>,
    func: Option<F>,
}

impl<F> Callback<F>
where
    F: FnOnce(&Handle) -> anyhow::Result<()>,
{
    pub fn new(func: F) -> Self {
        Self {
            delay: None,
            func: Some(func),
        }
    }

    pub fn delayed(delay: Duration, func: F) -> Self {
        Self {
            delay: Some(delay),
            func: Some(func),
        }
    }
}

impl<F> Resumable for Callback<F>
where
    F: FnOnce(&Handle) -> anyhow::Result<()>,
{
    fn start(&mut self, handle: &Handle) -> anyhow::Result<Step> {
        match self.delay.take() {
            Some(delay) => Ok(Step::sleep(delay)),
            None => self.resume(handle),
        }
    }

    fn resume(&mut self, handle: &Handle) -> anyhow::Result<Step> {
        let Some(func) = self.func.take() else {
            anyhow::bail!("callback resumed after it already ran");
        };
        func(handle)?;
        Ok(Step::Completed)
    }
}

impl<F> fmt::Debug for Callback<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("delay", &self.delay)
            .field("ran", &self.func.is_none())
            .finish()
    }
}
