// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::error::{InvariantViolation, RunError, SuspendError};
use crate::task::{Id, Resumable, State, Step, Suspend, TaskBuilder, YieldNow};
use crate::time::{Clock, DeadlineHeap, Instant, Sleep, StdClock};
use core::cell::{RefCell, RefMut};
use core::fmt;
use core::mem;
use core::time::Duration;
use static_assertions::assert_not_impl_any;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

/// A single threaded, cooperative scheduler that resumes tasks on the calling thread.
///
/// Tasks are resumed in the order they became ready. A task that sleeps is parked in a deadline
/// heap and only becomes ready again once its deadline has passed; a task blocked on a
/// [`Queue`][crate::Queue] becomes ready again when the queue hands it back.
///
/// The scheduler can run `!Send` tasks, with the tradeoff that it is itself `!Send` and `!Sync`.
pub struct Scheduler {
    handle: Handle,
}

/// A cheaply cloneable reference to a [`Scheduler`].
///
/// Handles are what task logic and [`Queue`][crate::Queue]s hold on to: they register new tasks,
/// create the suspension futures, and re-admit blocked tasks. Only the [`Scheduler`] itself can
/// [`run`][Scheduler::run].
#[derive(Clone)]
pub struct Handle {
    shared: Rc<Shared>,
}

/// Configuration for a [`Scheduler`].
pub struct Builder {
    name: &'static str,
    clock: Option<Box<dyn Clock>>,
    ready_capacity: usize,
}

/// The outcome of a single [`Scheduler::tick`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct Tick {
    /// The number of tasks resumed during this tick (zero or one).
    pub polled: usize,
    /// The number of resumed tasks that *completed* during this tick.
    ///
    /// This should always be <= `self.polled`.
    pub completed: usize,
    /// The number of sleeping tasks moved to the ready queue during this tick.
    pub woken: usize,
    /// `true` if any task is ready or sleeping after this tick.
    pub has_remaining: bool,
}

struct Shared {
    name: &'static str,
    clock: Box<dyn Clock>,
    core: RefCell<Core>,
}

struct Core {
    /// Tasks awaiting immediate resumption, in the order they became ready.
    ready: VecDeque<Id>,
    /// Sleeping tasks, by wake-up time.
    sleeping: DeadlineHeap,
    /// Every task this scheduler knows about, including finished ones.
    tasks: HashMap<Id, Slot>,
    /// The task currently being resumed.
    current: Option<Id>,
    /// Suspension kind announced by a suspension future during the current resumption.
    announced: Option<Suspend>,
    /// A second, different announcement made during the same resumption.
    conflict: Option<(Suspend, Suspend)>,
    /// How many waiting lists the current task is registered with during this resumption.
    registrations: usize,
    /// A violation detected outside of `tick`, reported by the next `tick`.
    violation: Option<InvariantViolation>,
}

struct Slot {
    /// `None` while the task is being resumed, and once it finished.
    task: Option<Box<dyn Resumable>>,
    state: State,
    started: bool,
    name: Option<String>,
    span: tracing::Span,
}

assert_not_impl_any!(Scheduler: Send, Sync);
assert_not_impl_any!(Handle: Send, Sync);

// === impl Builder ===

impl Builder {
    pub fn new() -> Self {
        Self {
            name: "cosched",
            clock: None,
            ready_capacity: 0,
        }
    }

    /// Name the scheduler, shows up in its spans.
    #[must_use]
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Replace the default [`StdClock`].
    #[must_use]
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Pre-allocate room for this many ready tasks.
    #[must_use]
    pub fn ready_capacity(mut self, capacity: usize) -> Self {
        self.ready_capacity = capacity;
        self
    }

    pub fn build(self) -> Scheduler {
        let clock = self
            .clock
            .unwrap_or_else(|| Box::new(StdClock::new()));

        Scheduler {
            handle: Handle {
                shared: Rc::new(Shared {
                    name: self.name,
                    clock,
                    core: RefCell::new(Core {
                        ready: VecDeque::with_capacity(self.ready_capacity),
                        sleeping: DeadlineHeap::new(),
                        tasks: HashMap::new(),
                        current: None,
                        announced: None,
                        conflict: None,
                        registrations: 0,
                        violation: None,
                    }),
                }),
            },
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

// === impl Scheduler ===

impl Scheduler {
    /// Returns a scheduler backed by the system clock.
    pub fn new() -> Self {
        Builder::new().build()
    }

    /// Returns a [`Builder`] for configuring the scheduler's name, clock and ready queue capacity.
    pub fn builder() -> Builder {
        Builder::new()
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Places a freshly created task at the back of the ready queue.
    #[track_caller]
    pub fn submit<T: Resumable + 'static>(&self, task: T) -> Id {
        self.handle.submit(task)
    }

    /// Same as [`Scheduler::submit`].
    #[track_caller]
    pub fn new_task<T: Resumable + 'static>(&self, task: T) -> Id {
        self.handle.submit(task)
    }

    #[track_caller]
    pub fn spawn<F>(&self, future: F) -> Id
    where
        F: Future<Output = anyhow::Result<()>> + 'static,
    {
        self.handle.spawn(future)
    }

    #[track_caller]
    pub fn call_soon<F>(&self, func: F) -> Id
    where
        F: FnOnce(&Handle) -> anyhow::Result<()> + 'static,
    {
        self.handle.call_soon(func)
    }

    #[track_caller]
    pub fn call_later<F>(&self, delay: Duration, func: F) -> Id
    where
        F: FnOnce(&Handle) -> anyhow::Result<()> + 'static,
    {
        self.handle.call_later(delay, func)
    }

    /// Returns a [`TaskBuilder`] for configuring a task's name, kind and location before
    /// registering it.
    pub fn build_task(&self) -> TaskBuilder<'_> {
        self.handle.build_task()
    }

    /// Runs tasks until none is ready or sleeping anymore.
    ///
    /// Tasks submitted while others run are driven to completion as well.
    ///
    /// # Errors
    ///
    /// - [`RunError::TaskFailed`] as soon as any task fails. No other task runs past that point,
    ///   but the remaining tasks stay registered and a later `run` picks up where this one stopped.
    /// - [`RunError::Invariant`] if the scheduler's bookkeeping was found to be inconsistent.
    /// - [`RunError::Stalled`] if tasks are still blocked on queues once nothing else can run.
    pub fn run(&self) -> Result<(), RunError> {
        let _span = tracing::debug_span!("scheduler.run", name = self.handle.shared.name).entered();

        loop {
            let tick = self.tick()?;
            if !tick.has_remaining {
                break;
            }
        }

        let mut core = self.handle.core();
        if let Some(violation) = core.violation.take() {
            return Err(violation.into());
        }

        let blocked = core.count(State::Blocked);
        if blocked > 0 {
            tracing::warn!(blocked, "scheduler stalled with blocked tasks");
            return Err(RunError::Stalled { blocked });
        }

        tracing::debug!("all tasks finished");
        Ok(())
    }

    /// Performs a single scheduling iteration, resuming at most one task.
    ///
    /// This is the only place the scheduler blocks: if no task is ready, it parks on its
    /// [`Clock`] until the nearest sleeping task is due.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::run`].
    pub fn tick(&self) -> Result<Tick, RunError> {
        let mut tick = Tick::default();
        let handle = &self.handle;

        let id = {
            let mut core = handle.core();
            if let Some(violation) = core.violation.take() {
                tracing::error!(%violation, "scheduling invariant violated");
                return Err(violation.into());
            }

            let now = handle.now();
            while let Some(entry) = core.sleeping.pop_expired(now) {
                core.make_ready(entry.task)?;
                tick.woken += 1;
            }

            if core.ready.is_empty()
                && let Some(entry) = core.sleeping.pop()
            {
                if entry.deadline > now {
                    // nobody else can make progress until then, so block the whole thread
                    drop(core);
                    tracing::trace!(deadline = %entry.deadline, "no task ready, parking");
                    handle.shared.clock.park_until(entry.deadline);
                    core = handle.core();
                }
                core.make_ready(entry.task)?;
                tick.woken += 1;
            }

            let Some(id) = core.ready.pop_front() else {
                tick.has_remaining = !core.sleeping.is_empty();
                return Ok(tick);
            };
            id
        };

        let (mut task, started, span) = handle.core().begin(id)?;

        let result = span.in_scope(|| {
            tracing::trace!(started, "resuming task");
            if started {
                task.resume(handle)
            } else {
                task.start(handle)
            }
        });
        tick.polled += 1;

        let mut core = handle.core();
        let registered = mem::take(&mut core.registrations) > 0;
        core.current = None;
        core.announced = None;
        core.conflict = None;

        match result {
            Ok(Step::Completed) => {
                span.in_scope(|| tracing::debug!("task completed"));
                core.finish(id, State::Completed);
                tick.completed += 1;
                drop(core);
                drop(task);
                tick.has_remaining = handle.core().has_remaining();
            }
            Err(source) => {
                span.in_scope(|| tracing::error!(error = %source, "task failed"));
                let name = core.finish(id, State::Failed);
                drop(core);
                // dropping the task here also releases any queue position it still held
                drop(task);
                return Err(RunError::TaskFailed {
                    task: id,
                    name,
                    source,
                });
            }
            Ok(Step::Suspended(kind)) => {
                span.in_scope(|| tracing::trace!(?kind, "task suspended"));
                core.suspend(id, task, kind, registered, handle.now())?;
                tick.has_remaining = core.has_remaining();
            }
        }

        Ok(tick)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // tasks usually hold handles to us, break the cycle. the tasks are dropped outside of the
        // borrow since their destructors may call back into the scheduler
        let tasks = mem::take(&mut self.handle.core().tasks);
        drop(tasks);
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("handle", &self.handle)
            .finish()
    }
}

// === impl Handle ===

impl Handle {
    /// Returns the scheduler's name.
    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    /// Returns the current time of the scheduler's clock.
    pub fn now(&self) -> Instant {
        self.shared.clock.now()
    }

    /// Returns the task that is currently being resumed, if any.
    pub fn current(&self) -> Option<Id> {
        self.core().current
    }

    /// Returns the lifecycle state of `task`, or `None` if this scheduler never saw it.
    pub fn state(&self, task: Id) -> Option<State> {
        self.core().tasks.get(&task).map(|slot| slot.state)
    }

    /// Returns the number of tasks that are ready to be resumed.
    pub fn ready_len(&self) -> usize {
        self.core().ready.len()
    }

    /// Returns the number of sleeping tasks.
    pub fn sleeping_len(&self) -> usize {
        self.core().sleeping.len()
    }

    /// Returns a [`TaskBuilder`] for registering a named task.
    pub fn build_task(&self) -> TaskBuilder<'_> {
        TaskBuilder::new(self)
    }

    /// Places a freshly created task at the back of the ready queue.
    #[track_caller]
    pub fn submit<T: Resumable + 'static>(&self, task: T) -> Id {
        self.build_task().submit(task)
    }

    /// Same as [`Handle::submit`].
    #[track_caller]
    pub fn new_task<T: Resumable + 'static>(&self, task: T) -> Id {
        self.build_task().submit(task)
    }

    /// Registers a [`Future`] as a task.
    #[track_caller]
    pub fn spawn<F>(&self, future: F) -> Id
    where
        F: Future<Output = anyhow::Result<()>> + 'static,
    {
        self.build_task().spawn(future)
    }

    /// Runs `func` as a task as soon as possible.
    #[track_caller]
    pub fn call_soon<F>(&self, func: F) -> Id
    where
        F: FnOnce(&Handle) -> anyhow::Result<()> + 'static,
    {
        self.build_task().call_soon(func)
    }

    /// Runs `func` as a task no sooner than `delay` from now.
    #[track_caller]
    pub fn call_later<F>(&self, delay: Duration, func: F) -> Id
    where
        F: FnOnce(&Handle) -> anyhow::Result<()> + 'static,
    {
        self.build_task().call_later(delay, func)
    }

    /// Yields execution back to the scheduler, every other ready task gets a turn first.
    pub fn yield_now(&self) -> YieldNow<'_> {
        YieldNow::new(self)
    }

    /// Waits until `duration` has elapsed.
    pub fn sleep(&self, duration: Duration) -> Sleep<'_> {
        Sleep::new(self, duration)
    }

    /// Waits until `deadline` has been reached.
    pub fn sleep_until(&self, deadline: Instant) -> Sleep<'_> {
        Sleep::until(self, deadline)
    }

    pub(crate) fn admit(
        &self,
        id: Id,
        task: Box<dyn Resumable>,
        name: Option<String>,
        span: tracing::Span,
    ) {
        span.in_scope(|| tracing::debug!("task submitted"));

        let mut core = self.core();
        core.tasks.insert(
            id,
            Slot {
                task: Some(task),
                state: State::Runnable,
                started: false,
                name,
                span,
            },
        );
        core.ready.push_back(id);
    }

    /// Marks the current task as blocked, the caller is now responsible for handing it back
    /// through [`Handle::wake`].
    ///
    /// # Panics
    ///
    /// Panics when called outside of a task.
    pub(crate) fn block_current(&self) -> Id {
        let mut core = self.core();
        let id = core
            .current
            .expect("blocking is only possible from within a task");

        if let Some(slot) = core.tasks.get_mut(&id) {
            slot.state = State::Blocked;
        }
        core.registrations += 1;
        core.announce(Suspend::Blocked);
        id
    }

    /// Reverts a [`Handle::block_current`] of a task that stopped waiting before it suspended.
    ///
    /// Only acts while `id` is still being resumed. Afterward the task is either torn down, or it
    /// was handed back through [`Handle::wake`] already.
    pub(crate) fn unblock_current(&self, id: Id) {
        let mut guard = self.core();
        let core = &mut *guard;
        if core.current != Some(id) {
            return;
        }

        core.registrations = core.registrations.saturating_sub(1);
        if core.registrations > 0 {
            return;
        }

        if let Some(slot) = core.tasks.get_mut(&id)
            && slot.state == State::Blocked
        {
            slot.state = State::Runnable;
        }
        if core.announced == Some(Suspend::Blocked) {
            core.announced = None;
        }
        tracing::trace!(task.tid = id.as_u64(), "task stopped waiting before suspending");
    }

    /// Hands a blocked task back to the ready queue.
    ///
    /// Returns `false` if the task can't take the hand-off because it finished in the meantime.
    pub(crate) fn wake(&self, id: Id) -> bool {
        let mut guard = self.core();
        let core = &mut *guard;

        let Some(slot) = core.tasks.get_mut(&id) else {
            tracing::error!(task.tid = id.as_u64(), "waking unknown task");
            core.violation
                .get_or_insert(InvariantViolation::MissingTask { task: id });
            return false;
        };

        match slot.state {
            State::Blocked => {
                tracing::trace!(task.tid = id.as_u64(), "waking blocked task");
                slot.state = State::Runnable;
                core.ready.push_back(id);
                true
            }
            state if state.is_terminal() => {
                tracing::warn!(task.tid = id.as_u64(), ?state, "skipping finished waiter");
                false
            }
            state => {
                tracing::error!(task.tid = id.as_u64(), ?state, "waking task that isn't blocked");
                core.violation
                    .get_or_insert(InvariantViolation::NotBlocked { task: id, state });
                false
            }
        }
    }

    pub(crate) fn announce(&self, kind: Suspend) {
        self.core().announce(kind);
    }

    pub(crate) fn take_announced(&self) -> Result<Option<Suspend>, SuspendError> {
        let mut core = self.core();
        let task = core.current.unwrap_or(Id::stub());
        match core.conflict.take() {
            Some((Suspend::Blocked, Suspend::Blocked)) => {
                return Err(SuspendError::BlockedTwice { task });
            }
            Some((first, second)) => {
                return Err(SuspendError::Conflicting {
                    task,
                    first,
                    second,
                });
            }
            None => {}
        }
        Ok(core.announced.take())
    }

    fn core(&self) -> RefMut<'_, Core> {
        self.shared.core.borrow_mut()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Handle");
        s.field("name", &self.shared.name);
        match self.shared.core.try_borrow() {
            Ok(core) => s
                .field("ready", &core.ready.len())
                .field("sleeping", &core.sleeping.len())
                .field("current", &core.current)
                .finish(),
            Err(_) => s.finish_non_exhaustive(),
        }
    }
}

// === impl Core ===

impl Core {
    fn announce(&mut self, kind: Suspend) {
        match self.announced {
            None => self.announced = Some(kind),
            // asking twice for the same thing is one suspension, unless it hands the task to two
            // waiting lists
            Some(first) if first == kind && kind != Suspend::Blocked => {}
            Some(first) => {
                self.conflict.get_or_insert((first, kind));
            }
        }
    }

    fn make_ready(&mut self, id: Id) -> Result<(), InvariantViolation> {
        let slot = self
            .tasks
            .get_mut(&id)
            .ok_or(InvariantViolation::MissingTask { task: id })?;
        if slot.state != State::Sleeping {
            return Err(InvariantViolation::NotRunnable {
                task: id,
                state: slot.state,
            });
        }
        slot.state = State::Runnable;
        self.ready.push_back(id);
        Ok(())
    }

    /// Takes the task out of its slot for resumption.
    fn begin(
        &mut self,
        id: Id,
    ) -> Result<(Box<dyn Resumable>, bool, tracing::Span), InvariantViolation> {
        let slot = self
            .tasks
            .get_mut(&id)
            .ok_or(InvariantViolation::MissingTask { task: id })?;
        if slot.state != State::Runnable {
            return Err(InvariantViolation::NotRunnable {
                task: id,
                state: slot.state,
            });
        }
        let task = slot
            .task
            .take()
            .ok_or(InvariantViolation::MissingTask { task: id })?;
        let started = mem::replace(&mut slot.started, true);
        let span = slot.span.clone();

        self.current = Some(id);
        self.announced = None;
        self.conflict = None;
        self.registrations = 0;

        Ok((task, started, span))
    }

    /// Puts a suspended task back into the container its suspension kind asks for.
    fn suspend(
        &mut self,
        id: Id,
        task: Box<dyn Resumable>,
        kind: Suspend,
        registered: bool,
        now: Instant,
    ) -> Result<(), InvariantViolation> {
        let slot = self
            .tasks
            .get_mut(&id)
            .ok_or(InvariantViolation::MissingTask { task: id })?;
        slot.task = Some(task);

        match kind {
            // the queue already owns the handle, or already gave it back to the ready queue
            Suspend::Blocked if registered => Ok(()),
            Suspend::Blocked => {
                slot.state = State::Failed;
                Err(InvariantViolation::BlockedWithoutWaiter { task: id })
            }
            _ if registered => {
                slot.state = State::Failed;
                Err(InvariantViolation::SuspendedWhileBlocked { task: id, kind })
            }
            Suspend::Yield => {
                self.ready.push_back(id);
                Ok(())
            }
            Suspend::Sleep(delay) => {
                slot.state = State::Sleeping;
                self.sleeping.push(now.saturating_add(delay), id);
                Ok(())
            }
        }
    }

    /// Records the final state of a task and returns its name.
    fn finish(&mut self, id: Id, state: State) -> Option<String> {
        debug_assert!(state.is_terminal());
        let slot = self.tasks.get_mut(&id)?;
        slot.state = state;
        slot.task = None;
        slot.span = tracing::Span::none();
        slot.name.take()
    }

    fn has_remaining(&self) -> bool {
        !self.ready.is_empty() || !self.sleeping.is_empty()
    }

    fn count(&self, state: State) -> usize {
        self.tasks
            .values()
            .filter(|slot| slot.state == state)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{Log, mock_scheduler, trace_init};
    use crate::time::MockClock;

    #[test]
    fn first_resumption_is_fifo() {
        let _trace = trace_init();
        let (sched, _clock) = mock_scheduler();
        let log = Log::default();

        for n in 1..=4 {
            let (h, log) = (sched.handle().clone(), log.clone());
            sched.spawn(async move {
                log.push(format!("T{n} first"));
                h.yield_now().await;
                log.push(format!("T{n} second"));
                Ok(())
            });
        }

        sched.run().unwrap();
        assert_eq!(
            log.take(),
            [
                "T1 first", "T2 first", "T3 first", "T4 first", "T1 second", "T2 second",
                "T3 second", "T4 second",
            ]
        );
    }

    #[test]
    fn descendants_run_to_completion() {
        let (sched, _clock) = mock_scheduler();
        let log = Log::default();

        let (h, l) = (sched.handle().clone(), log.clone());
        sched.spawn(async move {
            l.push("parent");
            let (h2, l2) = (h.clone(), l.clone());
            h.spawn(async move {
                l2.push("child");
                h2.call_soon(move |_| {
                    l2.push("grandchild");
                    Ok(())
                });
                Ok(())
            });
            h.yield_now().await;
            l.push("parent again");
            Ok(())
        });

        sched.run().unwrap();
        assert_eq!(log.take(), ["parent", "child", "parent again", "grandchild"]);
    }

    #[test]
    fn failure_stops_the_run() {
        let _trace = trace_init();
        let (sched, _clock) = mock_scheduler();
        let log = Log::default();

        let failing = sched
            .build_task()
            .name("failing")
            .spawn(async { Err::<(), _>(anyhow::anyhow!("task exploded")) });

        let (h, l) = (sched.handle().clone(), log.clone());
        let bystander = sched.spawn(async move {
            l.push("bystander");
            h.yield_now().await;
            l.push("bystander again");
            Ok(())
        });

        match sched.run() {
            Err(RunError::TaskFailed { task, name, source }) => {
                assert_eq!(task, failing);
                assert_eq!(name.as_deref(), Some("failing"));
                assert_eq!(source.to_string(), "task exploded");
            }
            other => panic!("expected task failure, got {other:?}"),
        }

        // the failure surfaced before anybody else got to run
        assert!(log.take().is_empty());
        assert_eq!(sched.handle().state(failing), Some(State::Failed));
        assert_eq!(sched.handle().state(bystander), Some(State::Runnable));

        // the remaining tasks can still be driven
        sched.run().unwrap();
        assert_eq!(log.take(), ["bystander", "bystander again"]);
        assert_eq!(sched.handle().state(bystander), Some(State::Completed));
    }

    #[test]
    fn call_later_orders_by_deadline() {
        let (sched, clock) = mock_scheduler();
        let log = Log::default();

        let l = log.clone();
        sched.call_later(Duration::from_secs(4), move |h| {
            l.push(("down", h.now()));
            Ok(())
        });
        let l = log.clone();
        sched.call_later(Duration::from_secs(1), move |h| {
            l.push(("up", h.now()));
            Ok(())
        });
        let l = log.clone();
        sched.call_soon(move |h| {
            l.push(("soon", h.now()));
            Ok(())
        });

        sched.run().unwrap();
        assert_eq!(
            log.take(),
            [
                ("soon", Instant::ZERO),
                ("up", Instant::from_duration(Duration::from_secs(1))),
                ("down", Instant::from_duration(Duration::from_secs(4))),
            ]
        );
        assert_eq!(clock.parks(), 2);
    }

    #[test]
    fn expired_sleepers_are_promoted_while_others_are_ready() {
        let (sched, clock) = mock_scheduler();
        let log = Log::default();

        let (h, l) = (sched.handle().clone(), log.clone());
        sched.spawn(async move {
            h.sleep(Duration::ZERO).await;
            l.push("sleeper");
            Ok(())
        });

        let (h, l) = (sched.handle().clone(), log.clone());
        sched.spawn(async move {
            for _ in 0..3 {
                l.push("spinner");
                h.yield_now().await;
            }
            Ok(())
        });

        sched.run().unwrap();
        assert_eq!(log.take(), ["spinner", "sleeper", "spinner", "spinner"]);
        assert_eq!(clock.parks(), 0);
    }

    #[test]
    fn completing_tick_reports_remaining_work() {
        let (sched, _clock) = mock_scheduler();
        sched.call_soon(|_| Ok(()));
        sched.call_soon(|_| Ok(()));

        let first = sched.tick().unwrap();
        assert_eq!((first.completed, first.has_remaining), (1, true));

        let second = sched.tick().unwrap();
        assert_eq!((second.completed, second.has_remaining), (1, false));
    }

    #[test]
    fn tick_reports_progress() {
        let (sched, _clock) = mock_scheduler();
        let h = sched.handle().clone();
        sched.spawn(async move {
            h.sleep(Duration::from_secs(1)).await;
            Ok(())
        });

        let first = sched.tick().unwrap();
        assert_eq!(
            first,
            Tick {
                polled: 1,
                completed: 0,
                woken: 0,
                has_remaining: true,
            }
        );
        assert_eq!(sched.handle().sleeping_len(), 1);

        let second = sched.tick().unwrap();
        assert_eq!(
            second,
            Tick {
                polled: 1,
                completed: 1,
                woken: 1,
                has_remaining: false,
            }
        );

        assert_eq!(sched.tick().unwrap(), Tick::default());
    }

    #[test]
    fn blocked_without_waiter_is_an_invariant_violation() {
        struct Liar;

        impl Resumable for Liar {
            fn resume(&mut self, _handle: &Handle) -> anyhow::Result<Step> {
                Ok(Step::blocked())
            }
        }

        let (sched, _clock) = mock_scheduler();
        let id = sched.submit(Liar);

        match sched.run() {
            Err(RunError::Invariant(InvariantViolation::BlockedWithoutWaiter { task })) => {
                assert_eq!(task, id);
            }
            other => panic!("expected invariant violation, got {other:?}"),
        }
    }

    #[test]
    fn current_is_set_only_during_resumption() {
        let (sched, _clock) = mock_scheduler();
        assert_eq!(sched.handle().current(), None);

        let seen = Log::default();
        let (h, s) = (sched.handle().clone(), seen.clone());
        let id = sched.spawn(async move {
            s.push(h.current());
            Ok(())
        });

        sched.run().unwrap();
        assert_eq!(seen.take(), [Some(id)]);
        assert_eq!(sched.handle().current(), None);
    }

    #[test]
    fn builder_configures_scheduler() {
        let clock = MockClock::new();
        clock.advance(Duration::from_secs(7));

        let sched = Scheduler::builder()
            .name("configured")
            .clock(clock.clone())
            .ready_capacity(16)
            .build();

        assert_eq!(sched.handle().name(), "configured");
        assert_eq!(
            sched.handle().now(),
            Instant::from_duration(Duration::from_secs(7))
        );
        sched.run().unwrap();
    }

    #[test]
    fn new_task_is_submit() {
        let (sched, _clock) = mock_scheduler();
        let log = Log::default();

        let l = log.clone();
        let id = sched.new_task(crate::task::Callback::new(move |_: &Handle| {
            l.push("ran");
            Ok(())
        }));
        assert_eq!(sched.handle().state(id), Some(State::Runnable));
        assert_eq!(sched.handle().ready_len(), 1);

        sched.run().unwrap();
        assert_eq!(log.take(), ["ran"]);
    }
}
