//! Shared test utilities and fixtures
//!
//! Timer-driven futures and scripted foreign future-likes for exercising
//! the resolution procedure.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use pledge_core::{EventLoop, Future, FutureLike, Notify, Resolver, ThenFn, Value};

/// A future fulfilled with `value` once the loop's clock passes `delay_ms`.
pub fn delayed_fulfill(event_loop: &EventLoop, delay_ms: u64, value: impl Into<Value>) -> Future {
    let value = value.into();
    let timers = event_loop.clone();
    Future::new(&event_loop.scheduler(), move |settle| {
        timers.set_timeout(delay_ms, move || settle.fulfill(value));
        Ok(())
    })
}

/// A future rejected with `reason` once the loop's clock passes `delay_ms`.
pub fn delayed_reject(event_loop: &EventLoop, delay_ms: u64, reason: impl Into<Value>) -> Future {
    let reason = reason.into();
    let timers = event_loop.clone();
    Future::new(&event_loop.scheduler(), move |settle| {
        timers.set_timeout(delay_ms, move || settle.reject(reason));
        Ok(())
    })
}

/// Ordered log of labels, shared between callbacks.
#[derive(Clone, Default)]
pub struct Trace(Rc<RefCell<Vec<String>>>);

impl Trace {
    pub fn push(&self, label: impl Into<String>) {
        self.0.borrow_mut().push(label.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

type Script = Rc<dyn Fn(Notify, Notify) -> Result<(), Value>>;

/// A foreign future-like whose `then` member runs a script.
pub struct Scripted {
    script: Script,
    reads: Rc<Cell<usize>>,
}

impl Scripted {
    pub fn new(script: impl Fn(Notify, Notify) -> Result<(), Value> + 'static) -> Self {
        Self {
            script: Rc::new(script),
            reads: Rc::new(Cell::new(0)),
        }
    }

    /// Counter of how many times `then` was looked up.
    pub fn reads(&self) -> Rc<Cell<usize>> {
        self.reads.clone()
    }
}

impl FutureLike for Scripted {
    fn then_member(&self) -> Result<Option<ThenFn>, Value> {
        self.reads.set(self.reads.get() + 1);
        let script = self.script.clone();
        Ok(Some(Box::new(move |on_fulfilled: Notify, on_rejected: Notify| {
            script(on_fulfilled, on_rejected)
        })))
    }
}

pub fn scripted(script: impl Fn(Notify, Notify) -> Result<(), Value> + 'static) -> Value {
    Value::foreign(Scripted::new(script))
}

/// A future-like whose `then` lookup itself fails.
pub struct FailingLookup {
    pub reason: Value,
    pub reads: Rc<Cell<usize>>,
}

impl FutureLike for FailingLookup {
    fn then_member(&self) -> Result<Option<ThenFn>, Value> {
        self.reads.set(self.reads.get() + 1);
        Err(self.reason.clone())
    }
}

/// An object with no callable `then`.
pub struct NoThen;

impl FutureLike for NoThen {
    fn then_member(&self) -> Result<Option<ThenFn>, Value> {
        Ok(None)
    }
}

/// A future whose resolver is kept outside for the test to drive.
pub fn deferred(event_loop: &EventLoop) -> (Future, Resolver) {
    let stash = Rc::new(RefCell::new(None));
    let keep = stash.clone();
    let future = Future::new(&event_loop.scheduler(), move |settle| {
        *keep.borrow_mut() = Some(settle);
        Ok(())
    });
    let resolver = stash
        .borrow_mut()
        .take()
        .expect("initializer runs synchronously");
    (future, resolver)
}
