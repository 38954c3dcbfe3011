// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::time::{Clock, Instant};
use core::cell::Cell;
use core::fmt;
use core::time::Duration;
use std::rc::Rc;

/// A [`Clock`] whose time only moves when told to.
///
/// Parking jumps the virtual time straight to the requested deadline, so programs that sleep for
/// hours finish instantly and always observe the same timestamps. Clones share the same time
/// source, keep one around to inspect or advance the clock after handing it to a scheduler.
///
/// ```
/// use cosched::time::{Clock, Instant, MockClock};
/// use core::time::Duration;
///
/// let clock = MockClock::new();
/// let observer = clock.clone();
///
/// clock.park_until(Instant::from_duration(Duration::from_secs(5)));
/// assert_eq!(observer.now(), Instant::from_duration(Duration::from_secs(5)));
/// assert_eq!(observer.parks(), 1);
/// ```
#[derive(Clone, Default)]
pub struct MockClock {
    inner: Rc<Inner>,
}

#[derive(Default)]
struct Inner {
    now: Cell<Instant>,
    parks: Cell<usize>,
}

impl MockClock {
    /// Returns a new clock that starts at [`Instant::ZERO`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the time forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let now = self.inner.now.get().saturating_add(duration);
        tracing::trace!(now = %now, "MockClock::advance");
        self.inner.now.set(now);
    }

    /// Returns how many times the clock was asked to park.
    #[must_use]
    pub fn parks(&self) -> usize {
        self.inner.parks.get()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.inner.now.get()
    }

    fn park_until(&self, deadline: Instant) {
        tracing::trace!(deadline = %deadline, "MockClock::park_until");
        self.inner.parks.set(self.inner.parks.get() + 1);
        if deadline > self.inner.now.get() {
            self.inner.now.set(deadline);
        }
    }
}

impl fmt::Debug for MockClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockClock")
            .field("now", &self.inner.now.get())
            .field("parks", &self.inner.parks.get())
            .finish()
    }
}
