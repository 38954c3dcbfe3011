// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::error::QueueClosed;
use crate::scheduler::Handle;
use crate::task::Id;
use core::cell::RefCell;
use core::fmt;
use core::mem;
use core::pin::Pin;
use core::task::{Context, Poll};
use static_assertions::assert_not_impl_any;
use std::collections::VecDeque;
use std::rc::Rc;

/// An unbounded, closable FIFO queue handing items between tasks of one scheduler.
///
/// Consumers that find the queue empty block until a producer [`put`][Queue::put]s an item or the
/// queue is [`close`][Queue::close]d. Blocked consumers are served in the order they started
/// waiting.
///
/// Closing only means no further items will be added: items buffered before the close can still
/// be retrieved, and only a `get` that finds the buffer drained fails with [`QueueClosed`].
///
/// Cloning a queue returns another reference to the same queue.
pub struct Queue<T> {
    shared: Rc<RefCell<Inner<T>>>,
    handle: Handle,
}

struct Inner<T> {
    items: VecDeque<T>,
    waiting: VecDeque<Id>,
    closed: bool,
}

/// Future returned by [`Queue::get`].
#[must_use = "futures do nothing unless `.await`ed or `poll`ed"]
pub struct Get<'a, T> {
    queue: &'a Queue<T>,
    /// Set while this future holds a position in the queue's waiting list.
    waiting: Option<Id>,
}

assert_not_impl_any!(Queue<u32>: Send, Sync);

// === impl Queue ===

impl<T> Queue<T> {
    /// Returns a new, open queue whose blocked consumers are re-admitted through `handle`.
    pub fn new(handle: &Handle) -> Self {
        Self {
            shared: Rc::new(RefCell::new(Inner {
                items: VecDeque::new(),
                waiting: VecDeque::new(),
                closed: false,
            })),
            handle: handle.clone(),
        }
    }

    /// Appends `item` to the queue, handing the longest waiting consumer back to the scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] if the queue has been closed. The item is dropped in that case.
    pub fn put(&self, item: T) -> Result<(), QueueClosed> {
        let mut inner = self.shared.borrow_mut();
        if inner.closed {
            tracing::trace!("put on closed queue");
            return Err(QueueClosed(()));
        }
        inner.items.push_back(item);

        while let Some(id) = inner.waiting.pop_front() {
            if self.handle.wake(id) {
                break;
            }
        }

        Ok(())
    }

    /// Removes the front item, or blocks the current task until there is one.
    ///
    /// Dropping the returned future before it completes gives up the task's place in the waiting
    /// list. If that happens during the same resumption that started waiting (for example when
    /// another branch of a `select` wins), the task is runnable again and may suspend in any
    /// other way.
    ///
    /// See [`Queue::poll_get`].
    pub fn get(&self) -> Get<'_, T> {
        Get {
            queue: self,
            waiting: None,
        }
    }

    /// Attempts to remove the front item without suspending.
    ///
    /// Returns `Ok(None)` if the queue is empty but still open.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] if the queue is closed and drained.
    pub fn try_get(&self) -> Result<Option<T>, QueueClosed> {
        let mut inner = self.shared.borrow_mut();
        match inner.items.pop_front() {
            Some(item) => {
                self.release_if_drained(&mut inner);
                Ok(Some(item))
            }
            None if inner.closed => Err(QueueClosed(())),
            None => Ok(None),
        }
    }

    /// Attempts to remove the front item, registering the current task as a waiter if there is
    /// none.
    ///
    /// This is the building block for hand-written [`Resumable`][crate::Resumable] tasks: on
    /// `Poll::Pending` the task has already been marked as blocked and must return
    /// [`Step::blocked`][crate::Step::blocked]. Once resumed it must call `poll_get` again, the
    /// item it was woken for may have been taken by somebody else in the meantime.
    ///
    /// # Panics
    ///
    /// Panics if the queue is empty and open and this is called outside of a task.
    pub fn poll_get(&self) -> Poll<Result<T, QueueClosed>> {
        let mut inner = self.shared.borrow_mut();

        if let Some(item) = inner.items.pop_front() {
            self.release_if_drained(&mut inner);
            return Poll::Ready(Ok(item));
        }

        if inner.closed {
            return Poll::Ready(Err(QueueClosed(())));
        }

        let id = self.handle.block_current();
        tracing::trace!(task.tid = id.as_u64(), waiters = inner.waiting.len(), "waiting on queue");
        inner.waiting.push_back(id);
        Poll::Pending
    }

    /// Closes the queue, this can't be undone.
    ///
    /// If the queue is empty, all waiting consumers are handed back to the scheduler so they can
    /// observe the closure. Otherwise they stay waiting and are served the remaining items first.
    pub fn close(&self) {
        let mut inner = self.shared.borrow_mut();
        if mem::replace(&mut inner.closed, true) {
            return;
        }
        tracing::debug!(items = inner.items.len(), waiters = inner.waiting.len(), "queue closed");
        self.release_if_drained(&mut inner);
    }

    pub fn is_closed(&self) -> bool {
        self.shared.borrow().closed
    }

    /// Returns the number of buffered items.
    pub fn len(&self) -> usize {
        self.shared.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.borrow().items.is_empty()
    }

    /// Returns the number of consumers blocked on this queue.
    pub fn waiters(&self) -> usize {
        self.shared.borrow().waiting.len()
    }

    /// Wakes every waiter once the queue is both closed and empty, none of them will ever get an
    /// item.
    fn release_if_drained(&self, inner: &mut Inner<T>) {
        if inner.closed && inner.items.is_empty() {
            for id in mem::take(&mut inner.waiting) {
                self.handle.wake(id);
            }
        }
    }

    /// Returns `true` if `id` was still waiting.
    fn remove_waiter(&self, id: Id) -> bool {
        let mut inner = self.shared.borrow_mut();
        let before = inner.waiting.len();
        inner.waiting.retain(|waiter| *waiter != id);
        let removed = inner.waiting.len() != before;
        if removed {
            tracing::trace!(task.tid = id.as_u64(), "removed abandoned waiter");
        }
        removed
    }
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            handle: self.handle.clone(),
        }
    }
}

impl<T> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Queue");
        match self.shared.try_borrow() {
            Ok(inner) => s
                .field("items", &inner.items.len())
                .field("waiting", &inner.waiting)
                .field("closed", &inner.closed)
                .finish_non_exhaustive(),
            Err(_) => s.finish_non_exhaustive(),
        }
    }
}

// === impl Get ===

impl<T> Future for Get<'_, T> {
    type Output = Result<T, QueueClosed>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let poll = self.queue.poll_get();
        self.waiting = if poll.is_pending() {
            self.queue.handle.current()
        } else {
            None
        };
        poll
    }
}

impl<T> Drop for Get<'_, T> {
    fn drop(&mut self) {
        // a task torn down while blocked must not be handed items anymore
        if let Some(id) = self.waiting.take()
            && self.queue.remove_waiter(id)
        {
            self.queue.handle.unblock_current(id);
        }
    }
}

impl<T> fmt::Debug for Get<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Get")
            .field("queue", self.queue)
            .field("waiting", &self.waiting)
            .finish()
    }
}
