//! Static constructors and aggregation over many futures.

use std::cell::{Cell, RefCell};
use std::mem;
use std::rc::Rc;

use pledge_scheduler::SchedulerRef;
use pledge_types::Settlement;

use crate::future::Future;
use crate::value::Value;

/// Positional result slots filled in by element settlement callbacks.
struct Tally {
    slots: RefCell<Vec<Value>>,
    remaining: Cell<usize>,
}

impl Tally {
    fn new(len: usize) -> Rc<Self> {
        Rc::new(Self {
            slots: RefCell::new(vec![Value::Undefined; len]),
            remaining: Cell::new(len),
        })
    }

    /// Store `value` at `index`. Returns every slot once the last one lands.
    fn record(&self, index: usize, value: Value) -> Option<Vec<Value>> {
        self.slots.borrow_mut()[index] = value;
        let remaining = self.remaining.get().saturating_sub(1);
        self.remaining.set(remaining);
        (remaining == 0).then(|| mem::take(&mut *self.slots.borrow_mut()))
    }
}

impl Future {
    /// `value` itself if it is already a future, otherwise a new future
    /// resolved with it (future-like values are still unwrapped).
    pub fn resolve(scheduler: &SchedulerRef, value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Future(future) => future,
            value => Self::new(scheduler, |settle| {
                settle.fulfill(value);
                Ok(())
            }),
        }
    }

    pub fn reject(scheduler: &SchedulerRef, reason: impl Into<Value>) -> Self {
        let reason = reason.into();
        Self::new(scheduler, |settle| {
            settle.reject(reason);
            Ok(())
        })
    }

    /// Fulfills with a [`Value::List`] aligned with `items` once every element
    /// fulfills; rejects with the first rejection observed.
    ///
    /// An empty input fulfills before this call returns.
    pub fn all<I>(scheduler: &SchedulerRef, items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        Self::new(scheduler, |settle| {
            if items.is_empty() {
                settle.fulfill(Value::List(Vec::new()));
                return Ok(());
            }
            let tally = Tally::new(items.len());
            for (index, item) in items.into_iter().enumerate() {
                let tally = tally.clone();
                let on_value = settle.clone();
                let on_reason = settle.clone();
                Self::resolve(scheduler, item).then_both(
                    move |value| {
                        if let Some(values) = tally.record(index, value) {
                            on_value.fulfill(Value::List(values));
                        }
                        Ok(Value::Undefined)
                    },
                    move |reason| {
                        on_reason.reject(reason);
                        Ok(Value::Undefined)
                    },
                );
            }
            Ok(())
        })
    }

    /// Settles the same way as the first element to settle. Plain values are
    /// coerced with [`Future::resolve`] and take part like any other element.
    ///
    /// An empty input never settles.
    pub fn race<I>(scheduler: &SchedulerRef, items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        Self::new(scheduler, |settle| {
            for item in items {
                let on_value = settle.clone();
                let on_reason = settle.clone();
                Self::resolve(scheduler, item).then_both(
                    move |value| {
                        on_value.fulfill(value);
                        Ok(Value::Undefined)
                    },
                    move |reason| {
                        on_reason.reject(reason);
                        Ok(Value::Undefined)
                    },
                );
            }
            Ok(())
        })
    }

    /// Fulfills with a [`Value::List`] of [`Value::Outcome`] entries, one per
    /// element at its original position, after the last element settles.
    /// Never rejects.
    pub fn all_settled<I>(scheduler: &SchedulerRef, items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        Self::new(scheduler, |settle| {
            if items.is_empty() {
                settle.fulfill(Value::List(Vec::new()));
                return Ok(());
            }
            let tally = Tally::new(items.len());
            for (index, item) in items.into_iter().enumerate() {
                let on_value = (tally.clone(), settle.clone());
                let on_reason = (tally.clone(), settle.clone());
                Self::resolve(scheduler, item).then_both(
                    move |value| {
                        let (tally, settle) = on_value;
                        let outcome = Value::from(Settlement::fulfilled(value));
                        if let Some(outcomes) = tally.record(index, outcome) {
                            settle.fulfill(Value::List(outcomes));
                        }
                        Ok(Value::Undefined)
                    },
                    move |reason| {
                        let (tally, settle) = on_reason;
                        let outcome = Value::from(Settlement::rejected(reason));
                        if let Some(outcomes) = tally.record(index, outcome) {
                            settle.fulfill(Value::List(outcomes));
                        }
                        Ok(Value::Undefined)
                    },
                );
            }
            Ok(())
        })
    }
}
