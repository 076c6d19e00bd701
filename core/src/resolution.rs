//! The resolution procedure: settling a future with a candidate value that
//! may itself be future-like.
//!
//! 1. Resolving a future with itself rejects it with
//!    [`FutureError::SelfResolution`].
//! 2. A future-like candidate has its `then` member read once, right away,
//!    and invoked once with two notifiers sharing a one-shot latch. A
//!    fulfillment value goes back through this procedure, so nesting of any
//!    depth unwraps.
//! 3. Anything else fulfills the future directly.
//!
//! Native futures answer `then` by registering a handler, and a foreign
//! `then` is invoked from a task on the target's scheduler, so each level
//! of nesting costs one deferred hop rather than one stack frame.

use std::cell::Cell;
use std::rc::Rc;

use pledge_scheduler::Scheduler;
use pledge_types::{FutureError, Settlement};

use crate::future::Future;
use crate::guard;
use crate::value::{FutureLike, Notify, Value};

pub(crate) fn resolve(target: &Future, candidate: Value) {
    if let Value::Future(inner) = &candidate
        && inner.ptr_eq(target)
    {
        tracing::trace!(future = %target.id(), "resolved with itself");
        target.settle(Settlement::rejected(Value::Error(
            FutureError::SelfResolution,
        )));
        return;
    }

    let lookup = match &candidate {
        Value::Future(inner) => Some(guard::call(|| inner.then_member())),
        Value::Foreign(object) => Some(guard::call(|| object.then_member())),
        _ => None,
    };
    let then = match lookup {
        None | Some(Ok(None)) => {
            target.settle(Settlement::fulfilled(candidate));
            return;
        }
        Some(Err(reason)) => {
            tracing::trace!(future = %target.id(), "then lookup failed");
            target.settle(Settlement::rejected(reason));
            return;
        }
        Some(Ok(Some(then))) => then,
    };

    let called = Rc::new(Cell::new(false));
    let on_fulfilled: Notify = {
        let target = target.clone();
        let called = called.clone();
        Rc::new(move |value: Value| {
            if called.replace(true) {
                return;
            }
            resolve(&target, value);
        })
    };
    let on_rejected: Notify = {
        let target = target.clone();
        let called = called.clone();
        Rc::new(move |reason: Value| {
            if called.replace(true) {
                return;
            }
            target.settle(Settlement::rejected(reason));
        })
    };

    let is_native = matches!(candidate, Value::Future(_));
    let scheduler = target.scheduler().clone();
    let target = target.clone();
    let job = move || {
        if let Err(reason) = guard::call(|| then(on_fulfilled, on_rejected)) {
            if called.replace(true) {
                tracing::trace!(future = %target.id(), "then failed after notifying, ignored");
            } else {
                target.settle(Settlement::rejected(reason));
            }
        }
    };
    if is_native {
        job();
    } else {
        scheduler.schedule_deferred(Box::new(job));
    }
}
