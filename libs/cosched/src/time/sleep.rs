// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::scheduler::Handle;
use crate::task::Suspend;
use crate::time::Instant;
use core::fmt;
use core::pin::Pin;
use core::task::{Context, Poll};
use core::time::Duration;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Target {
    Delay(Duration),
    Deadline(Instant),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum State {
    Unregistered,
    Registered,
}

/// Future returned by [`Handle::sleep`] and [`Handle::sleep_until`].
///
/// The first poll hands the task to the scheduler's deadline heap, the scheduler only resumes the
/// task again once the deadline has passed.
#[must_use = "futures do nothing unless `.await`ed or `poll`ed"]
pub struct Sleep<'a> {
    handle: &'a Handle,
    target: Target,
    state: State,
}

impl<'a> Sleep<'a> {
    pub(crate) fn new(handle: &'a Handle, duration: Duration) -> Self {
        Self {
            handle,
            target: Target::Delay(duration),
            state: State::Unregistered,
        }
    }

    pub(crate) fn until(handle: &'a Handle, deadline: Instant) -> Self {
        Self {
            handle,
            target: Target::Deadline(deadline),
            state: State::Unregistered,
        }
    }
}

impl Future for Sleep<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        tracing::trace!(self=?self, "Sleep::poll");

        match self.state {
            State::Unregistered => {
                let delay = match self.target {
                    Target::Delay(delay) => delay,
                    Target::Deadline(deadline) => deadline.duration_since(self.handle.now()),
                };

                self.handle.announce(Suspend::Sleep(delay));
                self.state = State::Registered;
                Poll::Pending
            }
            State::Registered => Poll::Ready(()),
        }
    }
}

impl fmt::Debug for Sleep<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sleep")
            .field("target", &self.target)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::test_util::{Log, mock_scheduler, trace_init};
    use crate::time::{Clock, Instant};
    use core::time::Duration;

    #[test]
    fn earlier_deadline_wakes_first() {
        let _trace = trace_init();
        let (sched, clock) = mock_scheduler();
        let log = Log::default();

        for (name, secs) in [("late", 2), ("early", 1)] {
            let (h, log) = (sched.handle().clone(), log.clone());
            sched.spawn(async move {
                h.sleep(Duration::from_secs(secs)).await;
                log.push((name, h.now()));
                Ok(())
            });
        }

        sched.run().unwrap();

        assert_eq!(
            log.take(),
            [
                ("early", Instant::from_duration(Duration::from_secs(1))),
                ("late", Instant::from_duration(Duration::from_secs(2))),
            ]
        );
        assert_eq!(clock.parks(), 2);
    }

    #[test]
    fn equal_deadlines_wake_in_request_order() {
        let (sched, _clock) = mock_scheduler();
        let log = Log::default();

        for name in ["first", "second", "third"] {
            let (h, log) = (sched.handle().clone(), log.clone());
            sched.spawn(async move {
                h.sleep(Duration::from_secs(1)).await;
                log.push(name);
                Ok(())
            });
        }

        sched.run().unwrap();
        assert_eq!(log.take(), ["first", "second", "third"]);
    }

    #[test]
    fn sleep_until_targets_absolute_deadline() {
        let (sched, clock) = mock_scheduler();
        clock.advance(Duration::from_secs(4));

        let h = sched.handle().clone();
        let c = clock.clone();
        sched.spawn(async move {
            h.sleep_until(Instant::from_duration(Duration::from_secs(10)))
                .await;
            assert_eq!(c.now(), Instant::from_duration(Duration::from_secs(10)));

            // deadlines in the past still suspend, but never park the process
            h.sleep_until(Instant::ZERO).await;
            Ok(())
        });

        sched.run().unwrap();
        assert_eq!(clock.parks(), 1);
    }

    #[test]
    fn sleep_on_std_clock() {
        let sched = crate::Scheduler::new();
        let h = sched.handle().clone();

        sched.spawn(async move {
            let begin = ::std::time::Instant::now();

            h.sleep(Duration::from_millis(50)).await;

            let elapsed = begin.elapsed();
            assert!(
                elapsed.as_millis() >= 50 && elapsed.as_millis() <= 500,
                "expected to sleep between 50ms and 500ms, but got {}",
                elapsed.as_millis()
            );
            Ok(())
        });

        sched.run().unwrap();
    }
}
