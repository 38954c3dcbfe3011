// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::scheduler::Handle;
use crate::task::Suspend;
use core::pin::Pin;
use core::task::{Context, Poll};

/// Future returned by [`Handle::yield_now`].
#[derive(Debug)]
#[must_use = "futures do nothing unless `.await`ed or `poll`ed"]
pub struct YieldNow<'a> {
    handle: &'a Handle,
    yielded: bool,
}

impl<'a> YieldNow<'a> {
    pub(crate) fn new(handle: &'a Handle) -> Self {
        Self {
            handle,
            yielded: false,
        }
    }
}

impl Future for YieldNow<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }

        self.yielded = true;

        // Yielding works by telling the scheduler to put us at the back of the ready queue and
        // then returning `Poll::Pending` to give up control
        self.handle.announce(Suspend::Yield);
        Poll::Pending
    }
}
