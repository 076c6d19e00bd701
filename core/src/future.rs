//! The future state machine.
//!
//! # Lifecycle
//!
//! ```text
//!            Resolver::fulfill ──► resolution ──┐
//!                                               ▼
//! Pending(handlers) ──────── settle() ────► Settled(Fulfilled | Rejected)
//!        ▲                                      │
//!   then() pushes                      each handler scheduled
//!   a handler                          as one deferred task
//! ```
//!
//! A future is settled at most once. Every handler registered through
//! [`Future::then_with`] runs exactly once, as its own task on the future's
//! scheduler, in registration order, and never inside the call that
//! registered it, even when the future had already settled by then.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use pledge_scheduler::{Scheduler, SchedulerRef};
use pledge_types::{FutureId, Settlement, State};

use crate::guard;
use crate::resolution;
use crate::value::{FutureLike, Notify, ThenFn, Value};

/// What a user callback produces: `Ok` returns a value, `Err` throws.
pub type Completion = Result<Value, Value>;

/// A fulfillment or rejection callback.
pub type Callback = Box<dyn FnOnce(Value) -> Completion>;

static NEXT_FUTURE_ID: AtomicU64 = AtomicU64::new(1);

enum Slot {
    Pending(Vec<Handler>),
    Settled(Settlement<Value>),
}

struct Handler {
    /// `None` passes the value through unchanged.
    on_fulfilled: Option<Callback>,
    /// `None` passes the reason through unchanged.
    on_rejected: Option<Callback>,
    settle_next: Resolver,
}

struct Inner {
    id: FutureId,
    scheduler: SchedulerRef,
    slot: RefCell<Slot>,
}

impl Drop for Inner {
    // A pending `then` chain is a linked list of `Rc<Inner>`; unlink it with
    // a worklist so dropping a long chain never recurses.
    fn drop(&mut self) {
        let Slot::Pending(handlers) = self.slot.get_mut() else {
            return;
        };
        let mut worklist = mem::take(handlers);
        while let Some(handler) = worklist.pop() {
            let Resolver { future, .. } = handler.settle_next;
            if let Ok(mut next) = Rc::try_unwrap(future.inner)
                && let Slot::Pending(downstream) = next.slot.get_mut()
            {
                worklist.append(downstream);
            }
        }
    }
}

/// A single-assignment, observe-many deferred value.
///
/// Cloning is cheap and yields another handle to the same future.
#[derive(Clone)]
pub struct Future {
    inner: Rc<Inner>,
}

impl Future {
    /// Create a future and run `init` synchronously with its [`Resolver`].
    ///
    /// An `Err` returned from `init`, or a panic inside it, rejects the
    /// future unless the resolver was already used.
    pub fn new<F>(scheduler: &SchedulerRef, init: F) -> Self
    where
        F: FnOnce(Resolver) -> Result<(), Value>,
    {
        let future = Self::pending(scheduler.clone());
        let resolver = Resolver::new(future.clone());
        let on_failure = resolver.clone();
        if let Err(reason) = guard::call(|| init(resolver)) {
            tracing::trace!(future = %future.id(), "initializer failed");
            on_failure.reject(reason);
        }
        future
    }

    fn pending(scheduler: SchedulerRef) -> Self {
        let id = FutureId::new(NEXT_FUTURE_ID.fetch_add(1, Ordering::Relaxed));
        Self {
            inner: Rc::new(Inner {
                id,
                scheduler,
                slot: RefCell::new(Slot::Pending(Vec::new())),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> FutureId {
        self.inner.id
    }

    /// The scheduler this future, and every future derived from it, notifies
    /// through.
    #[must_use]
    pub fn scheduler(&self) -> &SchedulerRef {
        &self.inner.scheduler
    }

    /// Whether both handles refer to the same future.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn state(&self) -> State {
        match &*self.inner.slot.borrow() {
            Slot::Pending(_) => State::Pending,
            Slot::Settled(settlement) => settlement.state(),
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state() == State::Pending
    }

    /// A copy of the settlement, or `None` while pending. Never waits.
    #[must_use]
    pub fn settlement(&self) -> Option<Settlement<Value>> {
        match &*self.inner.slot.borrow() {
            Slot::Pending(_) => None,
            Slot::Settled(settlement) => Some(settlement.clone()),
        }
    }

    #[must_use]
    pub fn value(&self) -> Option<Value> {
        self.settlement().and_then(|s| s.value().cloned())
    }

    #[must_use]
    pub fn reason(&self) -> Option<Value> {
        self.settlement().and_then(|s| s.reason().cloned())
    }

    /// Number of handlers still waiting for settlement.
    #[must_use]
    pub fn pending_handlers(&self) -> usize {
        match &*self.inner.slot.borrow() {
            Slot::Pending(handlers) => handlers.len(),
            Slot::Settled(_) => 0,
        }
    }

    // ── Chaining ─────────────────────────────────────────────

    /// Register both callbacks; `None` on either side passes the value or
    /// reason through to the returned future unchanged.
    pub fn then_with(&self, on_fulfilled: Option<Callback>, on_rejected: Option<Callback>) -> Self {
        Self::new(&self.inner.scheduler, |settle_next| {
            self.register(Handler {
                on_fulfilled,
                on_rejected,
                settle_next,
            });
            Ok(())
        })
    }

    pub fn then<F>(&self, on_fulfilled: F) -> Self
    where
        F: FnOnce(Value) -> Completion + 'static,
    {
        self.then_with(Some(Box::new(on_fulfilled)), None)
    }

    pub fn then_both<F, R>(&self, on_fulfilled: F, on_rejected: R) -> Self
    where
        F: FnOnce(Value) -> Completion + 'static,
        R: FnOnce(Value) -> Completion + 'static,
    {
        self.then_with(Some(Box::new(on_fulfilled)), Some(Box::new(on_rejected)))
    }

    pub fn catch<R>(&self, on_rejected: R) -> Self
    where
        R: FnOnce(Value) -> Completion + 'static,
    {
        self.then_with(None, Some(Box::new(on_rejected)))
    }

    // ── Settlement ───────────────────────────────────────────

    /// The single state transition. Returns `false` if already settled.
    pub(crate) fn settle(&self, settlement: Settlement<Value>) -> bool {
        let state = settlement.state();
        let handlers = {
            let mut slot = self.inner.slot.borrow_mut();
            let Slot::Pending(handlers) = &mut *slot else {
                tracing::trace!(future = %self.id(), %state, "settle ignored, already settled");
                return false;
            };
            let handlers = mem::take(handlers);
            *slot = Slot::Settled(settlement);
            handlers
        };
        tracing::trace!(
            future = %self.id(),
            %state,
            handlers = handlers.len(),
            "future settled"
        );
        for handler in handlers {
            self.schedule(handler);
        }
        true
    }

    fn register(&self, handler: Handler) {
        {
            let mut slot = self.inner.slot.borrow_mut();
            if let Slot::Pending(handlers) = &mut *slot {
                handlers.push(handler);
                return;
            }
        }
        self.schedule(handler);
    }

    fn schedule(&self, handler: Handler) {
        let source = self.clone();
        self.inner
            .scheduler
            .schedule_deferred(Box::new(move || source.run_handler(handler)));
    }

    fn run_handler(&self, handler: Handler) {
        let Some(settlement) = self.settlement() else {
            tracing::error!(future = %self.id(), "handler scheduled against a pending future");
            return;
        };
        let Handler {
            on_fulfilled,
            on_rejected,
            settle_next,
        } = handler;
        let callback = match settlement.state() {
            State::Rejected => on_rejected,
            _ => on_fulfilled,
        };
        let Some(callback) = callback else {
            match settlement {
                Settlement::Fulfilled { value } => settle_next.fulfill(value),
                Settlement::Rejected { reason } => settle_next.reject(reason),
            }
            return;
        };
        match guard::call(|| callback(settlement.into_payload())) {
            Ok(value) => settle_next.fulfill(value),
            Err(reason) => settle_next.reject(reason),
        }
    }
}

impl FutureLike for Future {
    fn then_member(&self) -> Result<Option<ThenFn>, Value> {
        let source = self.clone();
        Ok(Some(Box::new(move |on_fulfilled: Notify, on_rejected: Notify| {
            source.then_both(
                move |value| {
                    on_fulfilled(value);
                    Ok(Value::Undefined)
                },
                move |reason| {
                    on_rejected(reason);
                    Ok(Value::Undefined)
                },
            );
            Ok(())
        })))
    }
}

impl fmt::Debug for Future {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Future {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Future{}<{}>", self.id(), self.state())
    }
}

// ── Resolver ─────────────────────────────────────────────────

/// The settlement capabilities of one future.
///
/// Clones share one latch: the first `fulfill` or `reject` through any clone
/// wins and every later call is ignored, even while a fulfillment is still
/// waiting on a pending future-like value.
#[derive(Clone)]
pub struct Resolver {
    future: Future,
    resolved: Rc<Cell<bool>>,
}

impl Resolver {
    fn new(future: Future) -> Self {
        Self {
            future,
            resolved: Rc::new(Cell::new(false)),
        }
    }

    /// Resolve with `value`, unwrapping it first if it is future-like.
    pub fn fulfill(&self, value: impl Into<Value>) {
        if self.resolved.replace(true) {
            tracing::trace!(future = %self.future.id(), "fulfill ignored, already resolved");
            return;
        }
        resolution::resolve(&self.future, value.into());
    }

    /// Reject with `reason`, stored verbatim.
    pub fn reject(&self, reason: impl Into<Value>) {
        if self.resolved.replace(true) {
            tracing::trace!(future = %self.future.id(), "reject ignored, already resolved");
            return;
        }
        self.future.settle(Settlement::rejected(reason.into()));
    }

    /// Whether `fulfill` or `reject` has been called.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved.get()
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("future", &self.future)
            .field("resolved", &self.resolved.get())
            .finish()
    }
}
