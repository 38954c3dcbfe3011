// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Single-threaded cooperative task scheduling.
//!
//! A [`Scheduler`] drives many logical tasks to completion on the calling thread. Tasks hand
//! control back to the scheduler at explicit suspension points, telling it what should happen
//! next:
//!
//! - [`Suspend::Yield`]: run me again once everybody else that is ready had a turn.
//! - [`Suspend::Sleep`]: run me again no sooner than the given delay from now.
//! - [`Suspend::Blocked`]: somebody else (a [`Queue`]) will make me runnable again.
//!
//! Tasks are either hand-written state machines implementing [`Resumable`], or plain `async`
//! blocks which use the suspension futures returned by [`Handle::yield_now`], [`Handle::sleep`]
//! and [`Queue::get`].
//!
//! ```
//! use cosched::{Queue, QueueClosed, Scheduler};
//! use cosched::time::MockClock;
//! use core::time::Duration;
//!
//! let sched = Scheduler::builder().clock(MockClock::new()).build();
//! let queue = Queue::new(sched.handle());
//!
//! let (q, h) = (queue.clone(), sched.handle().clone());
//! sched.spawn(async move {
//!     for n in 0..3 {
//!         q.put(n)?;
//!         h.sleep(Duration::from_secs(1)).await;
//!     }
//!     q.close();
//!     Ok(())
//! });
//!
//! let q = queue.clone();
//! sched.spawn(async move {
//!     let mut seen = Vec::new();
//!     loop {
//!         match q.get().await {
//!             Ok(item) => seen.push(item),
//!             Err(QueueClosed { .. }) => break,
//!         }
//!     }
//!     assert_eq!(seen, [0, 1, 2]);
//!     Ok(())
//! });
//!
//! sched.run().unwrap();
//! ```
//!
//! Everything here is `!Send` and `!Sync`: a scheduler and all of its tasks live on one thread.

pub mod error;
pub mod scheduler;
pub mod sync;
pub mod task;
#[cfg(test)]
mod test_util;
pub mod time;

pub use error::{InvariantViolation, QueueClosed, RunError, SuspendError};
pub use scheduler::{Builder, Handle, Scheduler, Tick};
pub use sync::{Get, Queue};
pub use task::{Id, Resumable, State, Step, Suspend};
