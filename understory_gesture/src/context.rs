// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The gesture context: shared tables, clock, timers, and deferred tasks.
//!
//! A [`GestureContext`] owns everything recognizers share: the arena
//! registry, the pointer routing tables, the pointer signal resolver, and a
//! small scheduler. It is constructed once per input surface and passed by
//! reference to every recognizer and to the [`GestureBinding`](crate::GestureBinding).
//!
//! ## Batches
//!
//! Arena decisions are not delivered while the code that caused them is still
//! running. Every mutating context operation, and every recognizer entry
//! point, runs inside a *batch* ([`GestureContext::batch`]). Accept and reject
//! notifications produced inside a batch are queued and delivered in order
//! when the outermost batch finishes; notifications produced during delivery
//! join the end of the same queue. Outside of any batch, an operation is its
//! own batch, so its notifications are delivered before it returns.
//!
//! ## Time
//!
//! The context never reads a system clock. Its notion of "now" moves forward
//! when the host calls [`advance_to`](GestureContext::advance_to), which also
//! fires due timers in deadline order. The binding advances the clock to each
//! event's timestamp before dispatching it. Deferred tasks run when
//! [`drain_tasks`](GestureContext::drain_tasks) is called, after each timer,
//! and after each event the binding handles.
//!
//! ```
//! use core::cell::Cell;
//! use core::time::Duration;
//! use std::rc::Rc;
//! use understory_gesture::GestureContext;
//!
//! let ctx = GestureContext::new();
//! let fired = Rc::new(Cell::new(0));
//!
//! let counter = fired.clone();
//! ctx.start_timer(Duration::from_millis(100), move |_| counter.set(counter.get() + 1));
//! let counter = fired.clone();
//! let task = ctx.defer(move |_| counter.set(counter.get() + 10));
//! assert!(ctx.cancel_task(task));
//!
//! ctx.advance_to(Duration::from_millis(99));
//! assert_eq!(fired.get(), 0);
//! ctx.advance_to(Duration::from_millis(100));
//! assert_eq!(fired.get(), 1);
//! ```

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;
use core::time::Duration;

use log::trace;

use crate::arena::{ArenaEffect, ArenaRegistry, GestureArenaManager};
use crate::router::{PointerRouter, RouteTable};
use crate::settings::GestureSettings;
use crate::signal::{PointerSignalResolver, SignalSlot};

type Callback = Box<dyn FnOnce(&GestureContext)>;

/// Handle to a pending timer, used to cancel it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// Handle to a pending deferred task, used to cancel it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

struct PendingTimer {
    id: u64,
    due: Duration,
    callback: Callback,
}

struct PendingTask {
    id: u64,
    callback: Callback,
}

#[derive(Default)]
struct Scheduler {
    now: Duration,
    frame_time: Option<Duration>,
    next_id: u64,
    timers: Vec<PendingTimer>,
    tasks: VecDeque<PendingTask>,
}

impl Scheduler {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Removes and returns the earliest timer due at or before `now`.
    fn take_due(&mut self, now: Duration) -> Option<PendingTimer> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, timer)| timer.due <= now)
            .min_by_key(|(_, timer)| (timer.due, timer.id))
            .map(|(index, _)| index)?;
        let timer = self.timers.swap_remove(index);
        self.now = self.now.max(timer.due);
        Some(timer)
    }
}

/// Shared state for one input surface.
///
/// See the [module documentation](self) for how batches, time and deferred
/// tasks interact.
pub struct GestureContext {
    pub(crate) arena: RefCell<ArenaRegistry>,
    pub(crate) router: RefCell<RouteTable>,
    pub(crate) signals: RefCell<SignalSlot>,
    scheduler: RefCell<Scheduler>,
    settings: Cell<GestureSettings>,
    depth: Cell<u32>,
}

impl fmt::Debug for GestureContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheduler = self.scheduler.borrow();
        f.debug_struct("GestureContext")
            .field("now", &scheduler.now)
            .field("frame_time", &scheduler.frame_time)
            .field("pending_timers", &scheduler.timers.len())
            .field("pending_tasks", &scheduler.tasks.len())
            .field("settings", &self.settings.get())
            .field("depth", &self.depth.get())
            .finish_non_exhaustive()
    }
}

impl Default for GestureContext {
    fn default() -> Self {
        Self::new()
    }
}

impl GestureContext {
    /// Creates a context with default [`GestureSettings`] and the clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(GestureSettings::default())
    }

    /// Creates a context with the given settings.
    #[must_use]
    pub fn with_settings(settings: GestureSettings) -> Self {
        Self {
            arena: RefCell::new(ArenaRegistry::default()),
            router: RefCell::new(RouteTable::default()),
            signals: RefCell::new(SignalSlot::default()),
            scheduler: RefCell::new(Scheduler::default()),
            settings: Cell::new(settings),
            depth: Cell::new(0),
        }
    }

    /// Settings used by recognizers that do not override them.
    #[must_use]
    pub fn settings(&self) -> GestureSettings {
        self.settings.get()
    }

    /// Replaces the default settings.
    pub fn set_settings(&self, settings: GestureSettings) {
        self.settings.set(settings);
    }

    /// The gesture arena manager.
    #[must_use]
    pub fn arena(&self) -> GestureArenaManager<'_> {
        GestureArenaManager::new(self)
    }

    /// The pointer router.
    #[must_use]
    pub fn router(&self) -> PointerRouter<'_> {
        PointerRouter::new(self)
    }

    /// The pointer signal resolver.
    #[must_use]
    pub fn signals(&self) -> PointerSignalResolver<'_> {
        PointerSignalResolver::new(self)
    }

    /// Runs `f` as a batch, delivering queued arena notifications when the
    /// outermost batch ends.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.depth.set(self.depth.get() + 1);
        let result = f();
        let depth = self.depth.get() - 1;
        self.depth.set(depth);
        if depth == 0 {
            self.flush();
        }
        result
    }

    /// Returns `true` while a batch is running.
    #[must_use]
    pub fn is_batching(&self) -> bool {
        self.depth.get() > 0
    }

    fn flush(&self) {
        loop {
            let effect = self.arena.borrow_mut().pop_effect();
            let Some(effect) = effect else {
                break;
            };
            self.depth.set(self.depth.get() + 1);
            match effect {
                ArenaEffect::Accept { pointer, member } => member.accept_gesture(self, pointer),
                ArenaEffect::Reject { pointer, member } => member.reject_gesture(self, pointer),
                ArenaEffect::ResolveByDefault(pointer) => {
                    self.defer(move |ctx| ctx.arena().resolve_by_default(pointer));
                }
            }
            self.depth.set(self.depth.get() - 1);
        }
    }

    /// Current time on the context clock.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.scheduler.borrow().now
    }

    /// Records the timestamp of the frame currently being produced.
    ///
    /// Drag recognizers using
    /// [`MultitouchDragStrategy::AverageBoundaryPointers`](crate::MultitouchDragStrategy::AverageBoundaryPointers)
    /// group pointer deltas by frame.
    pub fn begin_frame(&self, timestamp: Duration) {
        self.scheduler.borrow_mut().frame_time = Some(timestamp);
    }

    /// Timestamp passed to the latest [`begin_frame`](Self::begin_frame).
    #[must_use]
    pub fn frame_time(&self) -> Option<Duration> {
        self.scheduler.borrow().frame_time
    }

    /// Schedules `callback` to run once, `delay` after the current time.
    pub fn start_timer(
        &self,
        delay: Duration,
        callback: impl FnOnce(&Self) + 'static,
    ) -> TimerHandle {
        let mut scheduler = self.scheduler.borrow_mut();
        let id = scheduler.next_id();
        let due = scheduler.now + delay;
        scheduler.timers.push(PendingTimer {
            id,
            due,
            callback: Box::new(callback),
        });
        TimerHandle(id)
    }

    /// Cancels a timer. Returns `false` if it already fired or was cancelled.
    pub fn cancel_timer(&self, handle: TimerHandle) -> bool {
        let mut scheduler = self.scheduler.borrow_mut();
        let before = scheduler.timers.len();
        scheduler.timers.retain(|timer| timer.id != handle.0);
        scheduler.timers.len() != before
    }

    /// Returns `true` if the timer has neither fired nor been cancelled.
    #[must_use]
    pub fn is_timer_active(&self, handle: TimerHandle) -> bool {
        self.scheduler
            .borrow()
            .timers
            .iter()
            .any(|timer| timer.id == handle.0)
    }

    /// Deadline of the earliest pending timer.
    #[must_use]
    pub fn next_timer_deadline(&self) -> Option<Duration> {
        self.scheduler
            .borrow()
            .timers
            .iter()
            .map(|timer| timer.due)
            .min()
    }

    /// Queues `callback` to run at the next [`drain_tasks`](Self::drain_tasks).
    pub fn defer(&self, callback: impl FnOnce(&Self) + 'static) -> TaskHandle {
        let mut scheduler = self.scheduler.borrow_mut();
        let id = scheduler.next_id();
        scheduler.tasks.push_back(PendingTask {
            id,
            callback: Box::new(callback),
        });
        TaskHandle(id)
    }

    /// Cancels a deferred task. Returns `false` if it already ran or was
    /// cancelled.
    pub fn cancel_task(&self, handle: TaskHandle) -> bool {
        let mut scheduler = self.scheduler.borrow_mut();
        let before = scheduler.tasks.len();
        scheduler.tasks.retain(|task| task.id != handle.0);
        scheduler.tasks.len() != before
    }

    /// Number of deferred tasks waiting to run.
    #[must_use]
    pub fn pending_task_count(&self) -> usize {
        self.scheduler.borrow().tasks.len()
    }

    /// Runs deferred tasks in FIFO order until the queue is empty, including
    /// tasks queued by the tasks themselves.
    pub fn drain_tasks(&self) {
        loop {
            let task = self.scheduler.borrow_mut().tasks.pop_front();
            let Some(task) = task else {
                break;
            };
            trace!("running deferred task {}", task.id);
            self.batch(|| (task.callback)(self));
        }
    }

    /// Moves the clock forward to `now`, firing due timers in deadline order.
    ///
    /// Each timer runs as its own batch and is followed by a task drain. The
    /// clock never moves backwards.
    pub fn advance_to(&self, now: Duration) {
        self.drain_tasks();
        loop {
            let timer = self.scheduler.borrow_mut().take_due(now);
            let Some(timer) = timer else {
                break;
            };
            trace!("firing timer {} due at {:?}", timer.id, timer.due);
            self.batch(|| (timer.callback)(self));
            self.drain_tasks();
        }
        let mut scheduler = self.scheduler.borrow_mut();
        scheduler.now = scheduler.now.max(now);
    }

    /// Moves the clock forward by `delta`.
    pub fn advance_by(&self, delta: Duration) {
        let now = self.now() + delta;
        self.advance_to(now);
    }
}
