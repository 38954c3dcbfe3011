// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::scheduler::Scheduler;
use crate::time::MockClock;
use core::cell::RefCell;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs a subscriber for the current test, filtered by `RUST_LOG`.
pub fn trace_init() -> tracing::subscriber::DefaultGuard {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .set_default()
}

/// A scheduler running on a [`MockClock`], so sleeping tests finish instantly.
pub fn mock_scheduler() -> (Scheduler, MockClock) {
    let clock = MockClock::new();
    let sched = Scheduler::builder()
        .name("test")
        .clock(clock.clone())
        .build();
    (sched, clock)
}

/// Shared event log for observing the order in which tasks did things.
#[derive(Debug)]
pub struct Log<T>(Rc<RefCell<Vec<T>>>);

impl<T> Log<T> {
    pub fn push(&self, event: T) {
        self.0.borrow_mut().push(event);
    }

    pub fn take(&self) -> Vec<T> {
        self.0.take()
    }
}

impl<T> Clone for Log<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Default for Log<T> {
    fn default() -> Self {
        Self(Rc::default())
    }
}
