// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::time::Instant;
use core::fmt;

/// The scheduler's only view of wall-clock time.
///
/// Injected through [`Builder::clock`][crate::Builder::clock], so tests can swap the system clock
/// for a [`MockClock`][crate::time::MockClock].
pub trait Clock {
    /// Returns the current point in time.
    fn now(&self) -> Instant;

    /// Suspends the whole process until `deadline` has been reached.
    ///
    /// This is the only place the scheduler blocks, and it only does so when no task is ready.
    fn park_until(&self, deadline: Instant);
}

/// A [`Clock`] backed by the operating system's monotonic clock.
#[derive(Clone)]
pub struct StdClock {
    anchor: std::time::Instant,
}

impl StdClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            anchor: std::time::Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now(&self) -> Instant {
        Instant::from_duration(self.anchor.elapsed())
    }

    fn park_until(&self, deadline: Instant) {
        let now = self.now();
        if deadline > now {
            let duration = deadline.duration_since(now);
            tracing::trace!(?duration, "parking current thread...");
            std::thread::sleep(duration);
        }
    }
}

impl fmt::Debug for StdClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdClock")
            .field("now", &self.now())
            .finish_non_exhaustive()
    }
}
