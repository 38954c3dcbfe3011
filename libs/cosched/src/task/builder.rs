// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::scheduler::Handle;
use crate::task::{Callback, FutureTask, Id, Resumable};
use core::panic::Location;
use core::time::Duration;

/// Configures a single task before handing it to the scheduler.
///
/// Obtained from [`Handle::build_task`].
#[derive(Debug, Clone)]
pub struct TaskBuilder<'a> {
    handle: &'a Handle,
    location: Option<Location<'a>>,
    name: Option<&'a str>,
    kind: &'a str,
}

impl<'a> TaskBuilder<'a> {
    pub(crate) fn new(handle: &'a Handle) -> Self {
        Self {
            handle,
            location: None,
            name: None,
            kind: "task",
        }
    }

    /// Override the name of the task.
    ///
    /// By default, tasks are unnamed.
    pub fn name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    /// Override the kind string of the task, this will only show up in debug messages and spans.
    ///
    /// By default, tasks are of kind `"task"`.
    pub fn kind(mut self, kind: &'a str) -> Self {
        self.kind = kind;
        self
    }

    /// Override the source code location that will be associated with the task.
    ///
    /// By default, tasks inherit the source code location of where they were submitted.
    pub fn location(mut self, location: Location<'a>) -> Self {
        self.location = Some(location);
        self
    }

    /// Register a hand-written [`Resumable`] task, making it schedulable.
    #[track_caller]
    pub fn submit<T>(self, task: T) -> Id
    where
        T: Resumable + 'static,
    {
        let id = Id::next();

        let loc = self.location.as_ref().unwrap_or(Location::caller());
        let span = tracing::trace_span!(
            "task",
            task.tid = id.as_u64(),
            task.name = ?self.name,
            task.kind = self.kind,
            loc.file = loc.file(),
            loc.line = loc.line(),
            loc.col = loc.column(),
        );

        self.handle
            .admit(id, Box::new(task), self.name.map(str::to_owned), span);
        id
    }

    /// Register a [`Future`] as a task, see [`FutureTask`].
    #[track_caller]
    pub fn spawn<F>(self, future: F) -> Id
    where
        F: Future<Output = anyhow::Result<()>> + 'static,
    {
        self.submit(FutureTask::new(future))
    }

    /// Run `func` as a task as soon as possible.
    #[track_caller]
    pub fn call_soon<F>(self, func: F) -> Id
    where
        F: FnOnce(&Handle) -> anyhow::Result<()> + 'static,
    {
        self.submit(Callback::new(func))
    }

    /// Run `func` as a task no sooner than `delay` from now.
    #[track_caller]
    pub fn call_later<F>(self, delay: Duration, func: F) -> Id
    where
        F: FnOnce(&Handle) -> anyhow::Result<()> + 'static,
    {
        self.submit(Callback::delayed(delay, func))
    }
}
