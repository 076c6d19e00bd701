//! Deterministic single-threaded event loop.
//!
//! Two queues, one thread:
//!
//! ```text
//! schedule_deferred(task) ──► microtasks (FIFO) ──┐
//!                                                  ├──► run_until_idle()
//! set_timeout(ms, task)   ──► timers (deadline) ───┘
//! ```
//!
//! The microtask queue is drained completely before the next timer fires,
//! so every callback scheduled through [`Scheduler`] runs ahead of any
//! timer-driven work queued after it. Time is virtual: firing a timer moves
//! the clock to its deadline instead of sleeping.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use serde::Deserialize;
use thiserror::Error;

use crate::{Scheduler, SchedulerRef, Task, TimerId, panic_payload_to_string};

const DEFAULT_MICROTASK_BUDGET: NonZeroUsize = NonZeroUsize::new(100_000).unwrap();

const fn default_microtask_budget() -> NonZeroUsize {
    DEFAULT_MICROTASK_BUDGET
}

const fn default_true() -> bool {
    true
}

/// Tuning for an [`EventLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EventLoopConfig {
    /// Maximum number of microtasks a single drain may run. Default: 100000.
    /// Zero is rejected at parse time.
    #[serde(default = "default_microtask_budget")]
    pub microtask_budget: NonZeroUsize,
    /// Catch panics escaping a task and keep the loop running. Default: true.
    #[serde(default = "default_true")]
    pub catch_task_panics: bool,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            microtask_budget: DEFAULT_MICROTASK_BUDGET,
            catch_task_panics: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoopError {
    #[error("microtask budget of {budget} exhausted in a single drain")]
    MicrotaskBudgetExhausted { budget: usize },
}

/// Counters accumulated while running the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub microtasks_run: u64,
    pub timers_fired: u64,
    /// Tasks that panicked and were caught.
    pub panicked: u64,
}

impl LoopStats {
    fn since(self, earlier: Self) -> Self {
        Self {
            microtasks_run: self.microtasks_run.saturating_sub(earlier.microtasks_run),
            timers_fired: self.timers_fired.saturating_sub(earlier.timers_fired),
            panicked: self.panicked.saturating_sub(earlier.panicked),
        }
    }
}

struct LoopState {
    config: EventLoopConfig,
    microtasks: RefCell<VecDeque<Task>>,
    // Keyed by (deadline, id) so equal deadlines fire in creation order.
    timers: RefCell<BTreeMap<(u64, TimerId), Task>>,
    now_ms: Cell<u64>,
    next_timer: Cell<u64>,
    stats: Cell<LoopStats>,
}

impl Scheduler for LoopState {
    fn schedule_deferred(&self, task: Task) {
        self.microtasks.borrow_mut().push_back(task);
    }
}

impl LoopState {
    fn bump(&self, update: impl FnOnce(&mut LoopStats)) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }
}

/// A single-threaded event loop with a FIFO microtask queue and a
/// virtual-clock timer queue.
///
/// Cloning yields another handle to the same loop.
#[derive(Clone)]
pub struct EventLoop {
    state: Rc<LoopState>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("now_ms", &self.now_ms())
            .field("pending_microtasks", &self.pending_microtasks())
            .field("pending_timers", &self.pending_timers())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl EventLoop {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EventLoopConfig::default())
    }

    #[must_use]
    pub fn with_config(config: EventLoopConfig) -> Self {
        Self {
            state: Rc::new(LoopState {
                config,
                microtasks: RefCell::new(VecDeque::new()),
                timers: RefCell::new(BTreeMap::new()),
                now_ms: Cell::new(0),
                next_timer: Cell::new(1),
                stats: Cell::new(LoopStats::default()),
            }),
        }
    }

    /// The microtask side of this loop, as handed to futures.
    #[must_use]
    pub fn scheduler(&self) -> SchedulerRef {
        self.state.clone()
    }

    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.state.now_ms.get()
    }

    #[must_use]
    pub fn pending_microtasks(&self) -> usize {
        self.state.microtasks.borrow().len()
    }

    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.state.timers.borrow().len()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending_microtasks() == 0 && self.pending_timers() == 0
    }

    #[must_use]
    pub fn stats(&self) -> LoopStats {
        self.state.stats.get()
    }

    /// Run `f` once the virtual clock reaches `now + delay_ms`.
    pub fn set_timeout(&self, delay_ms: u64, f: impl FnOnce() + 'static) -> TimerId {
        let id = TimerId::new(self.state.next_timer.get());
        self.state.next_timer.set(id.value() + 1);
        let deadline = self.now_ms().saturating_add(delay_ms);
        self.state
            .timers
            .borrow_mut()
            .insert((deadline, id), Box::new(f));
        tracing::trace!(timer = %id, deadline, "timer scheduled");
        id
    }

    /// Remove a timer that has not fired yet. Returns whether it was found.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        let mut timers = self.state.timers.borrow_mut();
        let key = timers.keys().find(|(_, timer)| *timer == id).copied();
        key.is_some_and(|key| timers.remove(&key).is_some())
    }

    /// Drain the microtask queue, including tasks scheduled while draining.
    ///
    /// Returns the number of tasks run. Stops with an error, leaving the
    /// remaining tasks queued, once the configured budget is spent.
    pub fn run_microtasks(&self) -> Result<usize, LoopError> {
        let budget = self.state.config.microtask_budget.get();
        let mut ran = 0;
        loop {
            let task = self.state.microtasks.borrow_mut().pop_front();
            let Some(task) = task else {
                break;
            };
            if ran == budget {
                self.state.microtasks.borrow_mut().push_front(task);
                tracing::warn!(budget, "microtask budget exhausted");
                return Err(LoopError::MicrotaskBudgetExhausted { budget });
            }
            self.run_task(task);
            ran += 1;
            self.state.bump(|stats| stats.microtasks_run += 1);
        }
        if ran > 0 {
            tracing::trace!(ran, "microtasks drained");
        }
        Ok(ran)
    }

    /// Run microtasks and timers until both queues are empty.
    pub fn run_until_idle(&self) -> Result<LoopStats, LoopError> {
        let before = self.stats();
        loop {
            self.run_microtasks()?;
            if !self.fire_next_timer(None) {
                break;
            }
        }
        let turn = self.stats().since(before);
        tracing::debug!(
            microtasks = turn.microtasks_run,
            timers = turn.timers_fired,
            now_ms = self.now_ms(),
            "event loop idle"
        );
        Ok(turn)
    }

    /// Advance the virtual clock by `ms`, firing every timer due on the way.
    pub fn advance_by(&self, ms: u64) -> Result<LoopStats, LoopError> {
        let before = self.stats();
        let target = self.now_ms().saturating_add(ms);
        loop {
            self.run_microtasks()?;
            if !self.fire_next_timer(Some(target)) {
                break;
            }
        }
        self.state.now_ms.set(target.max(self.now_ms()));
        Ok(self.stats().since(before))
    }

    fn fire_next_timer(&self, limit: Option<u64>) -> bool {
        let next = {
            let mut timers = self.state.timers.borrow_mut();
            match timers.first_key_value() {
                Some((&(deadline, _), _)) if limit.is_none_or(|limit| deadline <= limit) => {
                    timers.pop_first()
                }
                _ => None,
            }
        };
        let Some(((deadline, id), task)) = next else {
            return false;
        };
        self.state.now_ms.set(deadline.max(self.now_ms()));
        tracing::trace!(timer = %id, now_ms = self.now_ms(), "timer fired");
        self.run_task(task);
        self.state.bump(|stats| stats.timers_fired += 1);
        true
    }

    fn run_task(&self, task: Task) {
        if !self.state.config.catch_task_panics {
            task();
            return;
        }
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
            let message = panic_payload_to_string(&payload);
            tracing::error!(%message, "deferred task panicked");
            self.state.bump(|stats| stats.panicked += 1);
        }
    }
}
